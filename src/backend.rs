//! The seam between orchestration and the completion service.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;

use crate::conversation::{Role, Turn};
use crate::error::BackendError;

/// Text deltas in arrival order. The stream ending is the end-of-response
/// signal; it cannot be restarted.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            max_tokens: None,
            temperature: None,
        }
    }

    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl WireMessage {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user message carrying an instruction and one image.
    pub fn with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url.into() },
                },
            ]),
        }
    }
}

impl From<&Turn> for WireMessage {
    fn from(turn: &Turn) -> Self {
        WireMessage::text(turn.role, turn.content.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub quality: String,
    pub n: u8,
}

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Starts a streamed chat completion.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError>;

    /// Single-shot chat completion; returns the first choice's text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError>;

    /// Returns a URL for the generated image.
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, BackendError>;
}
