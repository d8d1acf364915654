use futures_util::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, trace};

use super::types::*;
use crate::provider::LLMProvider;
use crate::response::reject_empty_finish;
use crate::sse_stream::SseStreamExt;
use crate::types::{FinishReason, Role};
use crate::{Error, LLMRequest, Response, StreamEvent};

/// Public Gemini API endpoint (API-key authentication).
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "Gemini";

/// Google Gemini provider using the `generativelanguage` REST API.
///
/// Gemini receives the whole conversation as one flattened user prompt: the
/// context first, then every turn labelled `Usuario:` or `Asistente:`.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Create a new Gemini provider against the public endpoint.
    pub fn new(api_key: String) -> Result<Self, Error> {
        Self::with_options(api_key, GEMINI_BASE_URL.to_string(), Duration::from_secs(60))
    }

    /// Create a new Gemini provider with custom base URL (for testing).
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

    /// Render context and history as a single prompt.
    pub(crate) fn render_prompt(request: &LLMRequest) -> String {
        let mut prompt = format!("{}\n\n", request.context);

        for turn in &request.history {
            let label = match turn.role {
                Role::User => "Usuario",
                Role::Assistant => "Asistente",
            };
            prompt.push_str(label);
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push_str("\n\n");
        }

        prompt
    }

    /// Convert internal request to Gemini format.
    fn convert_request(request: &LLMRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart::text(Self::render_prompt(request))],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, model
        )
    }

    /// Convert one streamed chunk into events.
    fn convert_response(response: GeminiResponse) -> Result<Vec<StreamEvent>, Error> {
        if let Some(error) = response.error {
            return Err(Error::provider(PROVIDER, error.message));
        }
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(Error::provider(PROVIDER, format!("prompt blocked: {reason}")));
        }

        let mut events = Vec::new();

        if let Some(candidate) = response.candidates.into_iter().next() {
            let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
            for part in parts {
                if part.thought {
                    continue;
                }
                if let Some(text) = part.text.filter(|t| !t.is_empty()) {
                    events.push(StreamEvent::ContentDelta { delta: text });
                }
            }

            // A finish reason marks the final chunk.
            if let Some(reason) = candidate.finish_reason {
                events.push(StreamEvent::Done {
                    finish_reason: FinishReason::from_gemini(&reason),
                    usage: response.usage_metadata.map(Into::into).unwrap_or_default(),
                });
            }
        }

        Ok(events)
    }

    fn error_message(body: &str) -> String {
        serde_json::from_str::<GeminiErrorBody>(body)
            .map(|b| b.error.message)
            .unwrap_or_else(|_| body.trim().to_string())
    }
}

#[async_trait::async_trait]
impl LLMProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn generate(&self, request: &LLMRequest) -> Result<Response, Error> {
        let gemini_request = Self::convert_request(request);
        let endpoint = self.endpoint(&request.model);
        debug!(model = %request.model, turns = request.history.len(), "opening Gemini stream");

        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_request)
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
            .map(|sse_result| {
                let events = sse_result.and_then(|sse_event| {
                    let data = sse_event.data.trim();
                    if data.is_empty() || sse_event.is_done() {
                        return Ok(vec![]);
                    }
                    trace!(bytes = data.len(), "Gemini chunk");
                    let chunk = serde_json::from_str::<GeminiResponse>(data).map_err(|e| {
                        Error::provider(PROVIDER, format!("Failed to parse SSE event: {e}"))
                    })?;
                    Self::convert_response(chunk)
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
