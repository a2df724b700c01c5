// Backend credentials and fixed channel parameters.

use std::env;

lazy_static::lazy_static! {
    pub static ref OPENAI_BASE_URL: String = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    pub static ref OPENAI_API_KEY: String = env::var("OPENAI_API_KEY").unwrap_or_default();
}

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";
pub const IMAGE_MODEL: &str = "dall-e-3";

pub const VISION_MAX_TOKENS: u32 = 500;
pub const IMAGE_SIZE: &str = "1024x1024";
pub const IMAGE_QUALITY: &str = "standard";
/// Request body cap for design uploads.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Appended to the partial buffer while a reply is still streaming.
pub const STREAM_CURSOR: &str = "▌";

pub const DEFAULT_PORT: u16 = 8501;
pub const HELPLINE: &str = "1800-180-6677";
pub const SUPPORT_EMAIL: &str = "info@wondercement.com";
