pub mod backend;
pub mod chat;
pub mod codec;
pub mod constants;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod estimator;
pub mod openai;
pub mod prompts;
pub mod session;
pub mod stream;
pub mod web_server;

pub use backend::{ChatRequest, ChunkStream, CompletionBackend, ImageRequest};
pub use conversation::{MessageStore, Role, SessionProfile, Turn};
pub use dispatcher::{CompletionDispatcher, ModelSelection};
pub use error::{AssistantError, BackendError};
pub use estimator::{estimate, ConstructionGrade, MaterialEstimate, ProjectParameters, ProjectType};
pub use openai::{BackendConfig, OpenAiBackend};
pub use prompts::PromptProfile;
pub use session::Session;
pub use stream::{PendingStream, StreamState, StreamUpdate};
