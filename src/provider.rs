use crate::{Error, LLMRequest, Response};

/// A remote text-generation backend.
///
/// Implementations turn an [`LLMRequest`] into the provider's wire format and
/// adapt its streamed answer into [`crate::StreamEvent`]s. All responses are
/// streamed; use `response.stream()` or `response.text().await`.
#[async_trait::async_trait]
pub trait LLMProvider: Send + Sync + 'static {
    /// Short provider name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Open a streaming generation call.
    async fn generate(&self, request: &LLMRequest) -> Result<Response, Error>;
}
