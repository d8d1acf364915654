use thiserror::Error;

/// Errors that can occur when using the martai library.
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Streaming error: {0}")]
    Streaming(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Error::Auth(message.into())
    }

    pub fn streaming(message: impl Into<String>) -> Self {
        Error::Streaming(message.into())
    }

    /// Map a non-success HTTP status from a provider into an error.
    ///
    /// `message` is the provider's own explanation, usually pulled out of the
    /// JSON error body.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, message: String) -> Self {
        match status.as_u16() {
            401 | 403 => Error::auth(format!("{provider}: {message}")),
            404 => Error::ModelNotAvailable(message),
            429 => Error::RateLimit,
            code => Error::provider(provider, format!("API error ({code}): {message}")),
        }
    }

    /// Whether this error was raised while building the client or the request.
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
