use std::path::Path;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::codec;
use crate::conversation::{MessageStore, SessionProfile, Turn};
use crate::dispatcher::CompletionDispatcher;
use crate::error::AssistantError;
use crate::estimator::{self, MaterialEstimate, ProjectParameters};
use crate::prompts::PromptProfile;
use crate::stream::PendingStream;

/// Everything one user's conversation owns. Operations run one at a time.
pub struct Session {
    pub id: Uuid,
    prompts: &'static PromptProfile,
    store: MessageStore,
    profile: SessionProfile,
    dispatcher: CompletionDispatcher,
}

impl Session {
    pub fn start(dispatcher: CompletionDispatcher, prompts: &'static PromptProfile) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, profile = prompts.name, "Starting session");
        Self {
            id,
            prompts,
            store: MessageStore::new(prompts.system_prompt),
            profile: SessionProfile::default(),
            dispatcher,
        }
    }

    pub fn prompts(&self) -> &'static PromptProfile {
        self.prompts
    }

    pub fn messages(&self) -> &MessageStore {
        &self.store
    }

    pub fn visible_turns(&self) -> impl Iterator<Item = &Turn> {
        self.store.visible()
    }

    pub fn profile(&self) -> &SessionProfile {
        &self.profile
    }

    /// Records the user's message and opens the reply stream. Pull the
    /// returned stream to completion to commit the assistant turn.
    #[instrument(skip(self, text), fields(session = %self.id))]
    pub async fn submit_chat(&mut self, text: &str) -> PendingStream<'_> {
        self.store.append(Turn::user(text));
        if self.profile.observe(text) {
            debug!(profile = ?self.profile, "Session profile updated");
        }
        let source = self.dispatcher.stream_chat(self.store.snapshot()).await;
        PendingStream::new(&mut self.store, source, self.prompts.apology)
    }

    /// Vision analysis of an uploaded design. Nothing is added to the conversation.
    pub async fn analyze_design(&self, raw: &[u8]) -> Result<String, AssistantError> {
        self.dispatcher.analyze_design(self.prompts, raw).await
    }

    /// Reads and analyzes a design from disk; read failures are codec errors.
    pub async fn analyze_design_file(&self, path: &Path) -> Result<String, AssistantError> {
        let encoded = codec::encode_file(path)?;
        self.dispatcher.analyze_encoded(self.prompts, encoded).await
    }

    pub async fn generate_design(&self, description: &str) -> Result<String, AssistantError> {
        self.dispatcher.generate_design(self.prompts, description).await
    }

    pub async fn vastu_advice(&self, topic: &str) -> Result<String, AssistantError> {
        self.dispatcher.advise(self.prompts, topic).await
    }

    pub fn estimate(&self, params: &ProjectParameters) -> MaterialEstimate {
        estimator::estimate(params)
    }
}
