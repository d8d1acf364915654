//! The streaming client callers talk to.
//!
//! [`StreamingClient::generate`] never fails: any error is reported as one
//! final fragment starting with [`ERROR_MARKER`]. Callers that need to branch
//! on failure use [`StreamingClient::try_generate`] instead.

use futures_util::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::factory::{ProviderConfig, ProviderFactory, ProviderType};
use crate::types::{GenerationOptions, LLMRequest, Settings, StreamEvent, Turn};
use crate::{Error, LLMProvider};

/// Prefix of the synthetic fragment emitted when generation fails.
pub const ERROR_MARKER: &str = "Error al generar respuesta: ";

/// Lazy sequence of answer fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Lazy sequence of answer fragments that ends after the first error.
pub type TryFragmentStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

/// Whether `fragment` is the synthetic error fragment produced by `generate`.
pub fn is_error_fragment(fragment: &str) -> bool {
    fragment.starts_with(ERROR_MARKER)
}

/// Client bound to one provider and one set of [`Settings`].
///
/// Holds no per-call state. Each `generate` call opens its own provider
/// stream, so concurrent calls on a shared client are independent. Dropping a
/// stream closes the underlying HTTP response.
#[derive(Clone)]
pub struct StreamingClient {
    provider: Arc<dyn LLMProvider>,
    settings: Settings,
}

impl std::fmt::Debug for StreamingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingClient")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl StreamingClient {
    /// Create a Gemini client. Without an explicit key, `GOOGLE_API_KEY` is
    /// read from the environment.
    pub fn new(api_key: Option<String>) -> Result<Self, Error> {
        let config =
            ProviderConfig::resolve(ProviderType::Gemini, api_key, |name| std::env::var(name).ok())?;
        Self::from_config(&config)
    }

    /// Create a client for the provider selected by the environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_config(&ProviderConfig::from_env()?)
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self, Error> {
        let provider = ProviderFactory::create(config)?;
        info!(
            provider = provider.name(),
            model = %config.settings.model,
            "LLM client ready"
        );
        Ok(Self {
            provider: Arc::from(provider),
            settings: config.settings.clone(),
        })
    }

    /// Wrap an already constructed provider.
    pub fn with_provider<P: LLMProvider>(provider: P, settings: Settings) -> Self {
        Self {
            provider: Arc::new(provider),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Build the provider request for one call.
    pub fn build_request(
        &self,
        context_prompt: &str,
        history: &[Turn],
        options: &GenerationOptions,
    ) -> Result<LLMRequest, Error> {
        if context_prompt.trim().is_empty() {
            return Err(Error::config("context prompt must not be empty"));
        }
        let (temperature, max_tokens) = options.resolve(&self.settings)?;

        Ok(LLMRequest {
            model: self.settings.model.clone(),
            context: context_prompt.to_string(),
            history: history.to_vec(),
            temperature,
            max_tokens,
        })
    }

    /// Stream the answer to `history` under `context_prompt`.
    ///
    /// Nothing is sent until the returned stream is first polled. Failures
    /// become a single `"Error al generar respuesta: ..."` fragment, after
    /// which the stream ends.
    pub fn generate(
        &self,
        context_prompt: &str,
        history: &[Turn],
        options: &GenerationOptions,
    ) -> FragmentStream {
        let fragments = self
            .try_generate(context_prompt, history, options)
            .map(|fragment| match fragment {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "generation failed; reporting in-band");
                    format!("{ERROR_MARKER}{e}")
                }
            });
        Box::pin(fragments)
    }

    /// Like [`generate`](Self::generate) but yields `Err` instead of the
    /// in-band error fragment. The stream ends after the first error.
    pub fn try_generate(
        &self,
        context_prompt: &str,
        history: &[Turn],
        options: &GenerationOptions,
    ) -> TryFragmentStream {
        let provider = Arc::clone(&self.provider);
        let request = self.build_request(context_prompt, history, options);

        let opened = async move {
            let request = request?;
            debug!(
                provider = provider.name(),
                model = %request.model,
                turns = request.history.len(),
                temperature = request.temperature,
                max_tokens = request.max_tokens,
                "sending generation request"
            );
            provider.generate(&request).await
        };

        let events = stream::once(opened)
            .map(|opened| match opened {
                Ok(response) => response.stream(),
                Err(e) => stream::iter([Err::<StreamEvent, Error>(e)]).boxed(),
            })
            .flatten();

        let fragments = events
            .filter_map(|event| {
                futures_util::future::ready(match event {
                    Ok(StreamEvent::ContentDelta { delta }) if !delta.is_empty() => Some(Ok(delta)),
                    Ok(StreamEvent::ContentDelta { .. }) | Ok(StreamEvent::Done { .. }) => None,
                    Ok(StreamEvent::Error { error }) => Some(Err(Error::streaming(error))),
                    Err(e) => Some(Err(e)),
                })
            })
            .scan(false, |failed, fragment| {
                if *failed {
                    return futures_util::future::ready(None);
                }
                *failed = fragment.is_err();
                futures_util::future::ready(Some(fragment))
            });

        Box::pin(fragments)
    }

    /// Collect the whole answer. The error fragment, if any, is included.
    pub async fn generate_text(
        &self,
        context_prompt: &str,
        history: &[Turn],
        options: &GenerationOptions,
    ) -> String {
        self.generate(context_prompt, history, options)
            .collect::<Vec<_>>()
            .await
            .concat()
    }
}
