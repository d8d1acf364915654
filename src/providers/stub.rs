//! Scripted provider that replays fixed chunks without touching the network.

use std::sync::{Arc, Mutex};

use crate::provider::LLMProvider;
use crate::types::{FinishReason, Usage};
use crate::{Error, LLMRequest, Response, StreamEvent};

/// Where a [`StubProvider`] should fail.
#[derive(Debug, Clone, PartialEq)]
enum Failure {
    /// Refuse to open the stream at all.
    OnOpen(String),
    /// Fail after this many chunks were delivered.
    AfterChunks(usize, String),
}

/// Provider returning a fixed chunk sequence and recording every request.
///
/// Clones share the captured request log, so a test can keep one handle
/// while the client owns the other.
#[derive(Debug, Clone, Default)]
pub struct StubProvider {
    chunks: Vec<String>,
    failure: Option<Failure>,
    requests: Arc<Mutex<Vec<LLMRequest>>>,
}

impl StubProvider {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Fail before any chunk is delivered, like a rejected API call.
    pub fn failing_on_open(message: impl Into<String>) -> Self {
        Self {
            failure: Some(Failure::OnOpen(message.into())),
            ..Self::default()
        }
    }

    /// Deliver `after` chunks and then break the stream.
    pub fn failing_after(mut self, after: usize, message: impl Into<String>) -> Self {
        self.failure = Some(Failure::AfterChunks(after, message.into()));
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl LLMProvider for StubProvider {
    fn name(&self) -> &'static str {
        "Stub"
    }

    async fn generate(&self, request: &LLMRequest) -> Result<Response, Error> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let mut events: Vec<Result<StreamEvent, Error>> = Vec::new();
        match &self.failure {
            Some(Failure::OnOpen(message)) => return Err(Error::provider("Stub", message.clone())),
            Some(Failure::AfterChunks(after, message)) => {
                events.extend(self.chunks.iter().take(*after).map(|chunk| {
                    Ok(StreamEvent::ContentDelta {
                        delta: chunk.clone(),
                    })
                }));
                events.push(Err(Error::streaming(message.clone())));
            }
            None => {
                events.extend(self.chunks.iter().map(|chunk| {
                    Ok(StreamEvent::ContentDelta {
                        delta: chunk.clone(),
                    })
                }));
                events.push(Ok(StreamEvent::Done {
                    finish_reason: FinishReason::Stop,
                    usage: Usage::default(),
                }));
            }
        }

        Ok(Response::from_stream(futures_util::stream::iter(events)))
    }
}
