use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::backend::{ChatRequest, ChunkStream, CompletionBackend, ImageRequest, WireMessage};
use crate::codec;
use crate::constants;
use crate::conversation::{Role, Turn};
use crate::error::AssistantError;
use crate::prompts::PromptProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub chat: String,
    pub vision: String,
    pub image: String,
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self {
            chat: constants::DEFAULT_CHAT_MODEL.to_string(),
            vision: constants::DEFAULT_VISION_MODEL.to_string(),
            image: constants::IMAGE_MODEL.to_string(),
        }
    }
}

/// Builds requests for the four backend channels. Holds no conversation
/// state, so one dispatcher can serve any number of sessions.
#[derive(Clone)]
pub struct CompletionDispatcher {
    backend: Arc<dyn CompletionBackend>,
    models: ModelSelection,
}

impl CompletionDispatcher {
    pub fn new(backend: Arc<dyn CompletionBackend>, models: ModelSelection) -> Self {
        Self { backend, models }
    }

    /// Replays the whole conversation and opens a token stream.
    #[instrument(skip(self, turns), fields(turns = turns.len()))]
    pub async fn stream_chat(&self, turns: &[Turn]) -> Result<ChunkStream, AssistantError> {
        let messages = turns.iter().map(WireMessage::from).collect();
        let request = ChatRequest::new(&self.models.chat, messages).streaming();
        Ok(self.backend.stream_chat(&request).await?)
    }

    #[instrument(skip(self, profile, raw), fields(bytes = raw.len()))]
    pub async fn analyze_design(&self, profile: &PromptProfile, raw: &[u8]) -> Result<String, AssistantError> {
        let encoded = codec::encode_image(raw)?;
        self.analyze_encoded(profile, encoded).await
    }

    /// Same as [`Self::analyze_design`] for an image that is already base64.
    pub async fn analyze_encoded(&self, profile: &PromptProfile, encoded: String) -> Result<String, AssistantError> {
        let message = WireMessage::with_image(profile.analysis_prompt, codec::data_uri(&encoded));
        let request = ChatRequest::new(&self.models.vision, vec![message]).with_max_tokens(constants::VISION_MAX_TOKENS);

        let analysis = self.backend.complete(&request).await.map_err(|e| {
            if e.is_rejection() {
                AssistantError::Analysis(e.to_string())
            } else {
                AssistantError::from(e)
            }
        })?;
        if analysis.trim().is_empty() {
            warn!("Vision model returned an empty analysis");
            return Err(AssistantError::Analysis("the model returned no analysis".to_string()));
        }
        info!(chars = analysis.len(), "Design analysis complete");
        Ok(analysis)
    }

    #[instrument(skip(self, profile, description))]
    pub async fn generate_design(&self, profile: &PromptProfile, description: &str) -> Result<String, AssistantError> {
        if description.trim().is_empty() {
            return Err(AssistantError::EmptyPrompt);
        }
        let request = ImageRequest {
            model: self.models.image.clone(),
            prompt: profile.image_prompt(description),
            size: constants::IMAGE_SIZE.to_string(),
            quality: constants::IMAGE_QUALITY.to_string(),
            n: 1,
        };
        let url = self.backend.generate_image(&request).await?;
        info!("Design visualization generated");
        Ok(url)
    }

    #[instrument(skip(self, profile))]
    pub async fn advise(&self, profile: &PromptProfile, topic: &str) -> Result<String, AssistantError> {
        let messages = vec![
            WireMessage::text(Role::System, profile.advisory_system),
            WireMessage::text(Role::User, profile.advisory_question(topic)),
        ];
        let request = ChatRequest::new(&self.models.chat, messages);
        Ok(self.backend.complete(&request).await?)
    }
}
