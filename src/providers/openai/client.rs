use super::types::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage, OpenAIError};
use crate::provider::LLMProvider;
use crate::response::reject_empty_finish;
use crate::sse_stream::SseStreamExt;
use crate::types::FinishReason;
use crate::{Error, LLMRequest, Response, StreamEvent};
use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace};

/// Public OpenAI endpoint.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "OpenAI";

/// Provider for any OpenAI-compatible chat-completions endpoint.
///
/// The context prompt is sent as the `system` message and every turn keeps
/// its native role.
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::with_options(api_key, OPENAI_BASE_URL.to_string(), Duration::from_secs(60))
    }

    /// Create a new OpenAI provider with custom base URL.
    pub fn new_with_base_url(api_key: String, base_url: String) -> Result<Self, Error> {
        Self::with_options(api_key, base_url, Duration::from_secs(60))
    }

    pub fn with_options(api_key: String, base_url: String, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert internal request to chat-completions format.
    fn convert_request(request: &LLMRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.context.clone(),
        });
        messages.extend(request.history.iter().map(|turn| ChatMessage {
            role: turn.role.as_str().to_string(),
            content: turn.text.clone(),
        }));

        ChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        }
    }

    /// Convert one streamed chunk into events.
    fn convert_chunk(chunk: ChatCompletionChunk) -> Result<Vec<StreamEvent>, Error> {
        if let Some(error) = chunk.error {
            return Err(Error::provider(PROVIDER, error.message));
        }

        let mut events = Vec::new();

        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(delta) = choice.delta.content.filter(|d| !d.is_empty()) {
                events.push(StreamEvent::ContentDelta { delta });
            }
            if let Some(reason) = choice.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: FinishReason::from_openai(&reason),
                    usage: chunk.usage.map(Into::into).unwrap_or_default(),
                });
            }
        }

        Ok(events)
    }

    fn error_message(body: &str) -> String {
        serde_json::from_str::<OpenAIError>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string())
    }
}

#[async_trait::async_trait]
impl LLMProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, request: &LLMRequest) -> Result<Response, Error> {
        let openai_request = Self::convert_request(request);
        debug!(model = %request.model, messages = openai_request.messages.len(), "opening OpenAI stream");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&openai_request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(Error::from_status(PROVIDER, status, Self::error_message(&body)));
        }

        let event_stream = response
            .bytes_stream()
            .sse_events()
            // Nothing meaningful follows the sentinel.
            .take_while(|sse_result| {
                let done = matches!(sse_result, Ok(event) if event.is_done());
                futures_util::future::ready(!done)
            })
            .map(|sse_result| {
                let events = sse_result.and_then(|sse_event| {
                    trace!(bytes = sse_event.data.len(), "OpenAI chunk");
                    let chunk = serde_json::from_str::<ChatCompletionChunk>(&sse_event.data)
                        .map_err(|e| {
                            Error::provider(PROVIDER, format!("Failed to parse SSE event: {e}"))
                        })?;
                    Self::convert_chunk(chunk)
                });
                match events {
                    Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                    Err(e) => vec![Err(e)],
                }
            })
            .map(futures_util::stream::iter)
            .flatten();

        Ok(Response::from_stream(reject_empty_finish(
            PROVIDER,
            event_stream,
        )))
    }
}
