use thiserror::Error;

/// Failures surfaced to the user. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssistantError {
    #[error("completion backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("design analysis failed: {0}")]
    Analysis(String),
    #[error("design description is empty")]
    EmptyPrompt,
    #[error("could not read uploaded image: {0}")]
    Codec(String),
}

impl AssistantError {
    /// Short, non-technical notice for the presentation layer.
    pub fn user_notice(&self) -> &'static str {
        match self {
            AssistantError::BackendUnavailable(_) => {
                "We could not reach the assistant right now. Please try again."
            }
            AssistantError::Analysis(_) | AssistantError::Codec(_) => {
                "Please try a different image or contact support."
            }
            AssistantError::EmptyPrompt => "Please describe your design vision first.",
        }
    }
}

/// Transport-level failures reported by a completion backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl BackendError {
    /// The backend understood the request but refused its content.
    pub fn is_rejection(&self) -> bool {
        matches!(self, BackendError::Status { status, .. } if *status == 400 || *status == 422)
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

impl From<BackendError> for AssistantError {
    fn from(err: BackendError) -> Self {
        AssistantError::BackendUnavailable(err.to_string())
    }
}
