//! Pull-driven assembly of a streamed chat reply.
//!
//! A [`PendingStream`] borrows the session's [`MessageStore`] for the length
//! of one reply. Every call to [`PendingStream::next_update`] pulls at most
//! one chunk, so the caller can render the partial text between pulls. When
//! the stream ends or fails, exactly one assistant turn is committed: the
//! assembled reply, or the profile's apology.

use futures::StreamExt;
use tracing::{debug, error};

use crate::backend::ChunkStream;
use crate::constants::STREAM_CURSOR;
use crate::conversation::{MessageStore, Turn};
use crate::error::AssistantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Streaming,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    /// Text so far followed by the cursor marker.
    Partial(String),
    /// The committed reply.
    Complete(String),
    /// The committed apology and what went wrong.
    Failed { reply: String, error: AssistantError },
}

impl StreamUpdate {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamUpdate::Partial(_))
    }
}

pub struct PendingStream<'a> {
    store: &'a mut MessageStore,
    source: Option<ChunkStream>,
    dispatch_error: Option<AssistantError>,
    buffer: String,
    state: StreamState,
    outcome: Option<StreamUpdate>,
    apology: &'static str,
}

impl<'a> PendingStream<'a> {
    /// `source` is the dispatch result; an error there fails on the first pull.
    pub fn new(
        store: &'a mut MessageStore,
        source: Result<ChunkStream, AssistantError>,
        apology: &'static str,
    ) -> Self {
        let (source, dispatch_error) = match source {
            Ok(stream) => (Some(stream), None),
            Err(err) => (None, Some(err)),
        };
        Self {
            store,
            source,
            dispatch_error,
            buffer: String::new(),
            state: StreamState::Idle,
            outcome: None,
            apology,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Text accumulated so far, without the cursor.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Complete | StreamState::Failed)
    }

    /// Pulls the next chunk. Returns `None` once a terminal update was given.
    pub async fn next_update(&mut self) -> Option<StreamUpdate> {
        match self.state {
            StreamState::Complete | StreamState::Failed => return None,
            StreamState::Idle => {
                if let Some(err) = self.dispatch_error.take() {
                    return Some(self.fail(err));
                }
                self.state = StreamState::Streaming;
            }
            StreamState::Streaming => {}
        }

        loop {
            let item = match self.source.as_mut() {
                Some(source) => source.next().await,
                None => None,
            };
            match item {
                Some(Ok(chunk)) => {
                    if chunk.is_empty() {
                        continue;
                    }
                    self.buffer.push_str(&chunk);
                    return Some(StreamUpdate::Partial(format!("{}{}", self.buffer, STREAM_CURSOR)));
                }
                Some(Err(err)) => return Some(self.fail(err.into())),
                None => return Some(self.complete()),
            }
        }
    }

    /// Drives the stream to its end, discarding partial updates.
    pub async fn finish(mut self) -> StreamUpdate {
        loop {
            match self.next_update().await {
                Some(update) if update.is_terminal() => return update,
                Some(_) => continue,
                // Already terminal before this call.
                None => {
                    return self
                        .outcome
                        .take()
                        .unwrap_or_else(|| StreamUpdate::Complete(self.buffer.clone()));
                }
            }
        }
    }

    fn complete(&mut self) -> StreamUpdate {
        self.source = None;
        self.state = StreamState::Complete;
        debug!(chars = self.buffer.len(), "Stream complete");
        self.store.append(Turn::assistant(self.buffer.clone()));
        self.settle(StreamUpdate::Complete(self.buffer.clone()))
    }

    fn fail(&mut self, error: AssistantError) -> StreamUpdate {
        error!("Chat stream failed: {}", error);
        self.source = None;
        self.state = StreamState::Failed;
        self.buffer = self.apology.to_string();
        self.store.append(Turn::assistant(self.buffer.clone()));
        self.settle(StreamUpdate::Failed {
            reply: self.buffer.clone(),
            error,
        })
    }

    fn settle(&mut self, update: StreamUpdate) -> StreamUpdate {
        self.outcome = Some(update.clone());
        update
    }
}
