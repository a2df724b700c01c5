use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{future, StreamExt};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use crate::backend::{ChatRequest, ChunkStream, CompletionBackend, ImageRequest};
use crate::constants;
use crate::error::BackendError;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub api_key: String,
}

impl BackendConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: constants::OPENAI_BASE_URL.clone(),
            api_key: constants::OPENAI_API_KEY.clone(),
        }
    }

    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

// Response shapes of the OpenAI-compatible API; unused fields are ignored.
#[derive(Deserialize, Debug)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize, Debug)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Deserialize, Debug, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    url: Option<String>,
}

/// HTTP client for an OpenAI-compatible completion service.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: Client,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, BackendError> {
        Self::new(BackendConfig::from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, BackendError> {
        let url = self.endpoint(path);
        let mut request = self.client.post(&url).json(body);
        if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }
        let response = request.send().await.map_err(|e| {
            error!("Failed to send request to {}: {}", url, e);
            BackendError::Transport(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(%status, %body, "Completion API request failed");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// One SSE data payload to its text delta. `Ok(None)` for chunks without text.
fn parse_stream_data(data: &str) -> Result<Option<String>, BackendError> {
    let chunk: StreamChunk = serde_json::from_str(data)
        .map_err(|e| BackendError::Decode(format!("stream chunk: {}: {}", e, data)))?;
    if let Some(api_error) = chunk.error {
        return Err(BackendError::Transport(api_error.message));
    }
    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError> {
        if !request.stream {
            warn!("stream_chat called with a non-streaming request; forcing stream");
        }
        let mut request = request.clone();
        request.stream = true;

        let response = self.post("chat/completions", &request).await?;
        debug!("Completion stream opened");

        let chunks = response
            .bytes_stream()
            .eventsource()
            .take_while(|event| future::ready(!matches!(event, Ok(event) if event.data.trim() == "[DONE]")))
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => parse_stream_data(&event.data).transpose(),
                    Err(e) => Some(Err(BackendError::Transport(format!("SSE stream error: {}", e)))),
                })
            });
        Ok(Box::pin(chunks))
    }

    #[instrument(skip(self, request), fields(model = %request.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, BackendError> {
        let response = self.post("chat/completions", request).await?;
        let completion = response.json::<CompletionResponse>().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(chars = content.len(), "Received completion");
        Ok(content)
    }

    #[instrument(skip(self, request), fields(model = %request.model, size = %request.size))]
    async fn generate_image(&self, request: &ImageRequest) -> Result<String, BackendError> {
        let response = self.post("images/generations", request).await?;
        let images = response.json::<ImageResponse>().await?;
        images
            .data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| BackendError::Decode("image response contained no url".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_delta() {
        let data = r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_stream_data(data).unwrap(), Some("Hel".to_string()));
    }

    #[test]
    fn test_role_only_delta_has_no_text() {
        let data = r#"{"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_stream_data(data).unwrap(), None);
        let data = r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_stream_data(data).unwrap(), None);
    }

    #[test]
    fn test_error_payload_fails_stream() {
        let data = r#"{"error":{"message":"rate limited"}}"#;
        assert!(matches!(parse_stream_data(data), Err(BackendError::Transport(msg)) if msg == "rate limited"));
    }

    #[test]
    fn test_malformed_chunk_is_decode_error() {
        assert!(matches!(parse_stream_data("{not json"), Err(BackendError::Decode(_))));
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let backend = OpenAiBackend::new(BackendConfig::new("http://localhost:9000/v1/", "")).unwrap();
        assert_eq!(backend.endpoint("chat/completions"), "http://localhost:9000/v1/chat/completions");
    }
}
