use std::env;
use std::str::FromStr;
use tracing::debug;

use crate::types::{Settings, DEFAULT_MODEL};
use crate::{Error, GeminiProvider, LLMProvider, OpenAIProvider};

/// Environment variable selecting the provider (`gemini` or `openai`).
pub const PROVIDER_ENV: &str = "LLM_PROVIDER";
/// Environment variable overriding the bound model.
pub const MODEL_ENV: &str = "LLM_MODEL";
/// Environment variable overriding the provider endpoint.
pub const BASE_URL_ENV: &str = "LLM_BASE_URL";
pub const GEMINI_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default model for OpenAI-compatible endpoints.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Supported LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Gemini,
    OpenAI,
}

impl ProviderType {
    /// Environment variable holding this provider's API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderType::Gemini => GEMINI_API_KEY_ENV,
            ProviderType::OpenAI => OPENAI_API_KEY_ENV,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderType::Gemini => DEFAULT_MODEL,
            ProviderType::OpenAI => DEFAULT_OPENAI_MODEL,
        }
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Error> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderType::Gemini),
            "openai" => Ok(ProviderType::OpenAI),
            _ => Err(Error::config(format!(
                "Unsupported provider '{name}'. Valid values are: gemini, openai"
            ))),
        }
    }
}

/// Configuration for creating providers.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: String,
    pub base_url: Option<String>,
    pub settings: Settings,
}

// Keeps the key out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider_type", &self.provider_type)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ProviderConfig {
    /// Create configuration for the Gemini provider.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(ProviderType::Gemini, api_key)
    }

    /// Create configuration for an OpenAI-compatible provider.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(ProviderType::OpenAI, api_key)
    }

    fn new(provider_type: ProviderType, api_key: impl Into<String>) -> Self {
        Self {
            provider_type,
            api_key: api_key.into(),
            base_url: None,
            settings: Settings::with_model(provider_type.default_model()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve a provider's configuration from an explicit key, falling back
    /// to `lookup` for the provider's key variable. Empty values count as
    /// missing. `LLM_MODEL` and `LLM_BASE_URL` are not consulted here since
    /// they may have been set for a different provider.
    pub fn resolve<F>(
        provider_type: ProviderType,
        api_key: Option<String>,
        lookup: F,
    ) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key_env = provider_type.api_key_env();
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| lookup(key_env).filter(|key| !key.trim().is_empty()))
            .ok_or_else(|| {
                Error::config(format!(
                    "{key_env} is required in the environment for the {provider_type:?} provider"
                ))
            })?;

        Ok(Self::new(provider_type, api_key))
    }

    /// Create configuration from variables supplied by `lookup`, including
    /// the model and endpoint overrides for the selected provider.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_type = match lookup(PROVIDER_ENV) {
            Some(name) => name.parse()?,
            None => ProviderType::Gemini,
        };
        let mut config = Self::resolve(provider_type, None, &lookup)?;
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            config.settings.model = model;
        }
        config.base_url = lookup(BASE_URL_ENV).filter(|u| !u.trim().is_empty());
        Ok(config)
    }

    /// Create configuration from the process environment, loading a `.env`
    /// file first when one exists.
    pub fn from_env() -> Result<Self, Error> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| env::var(name).ok())
    }
}

/// Factory for creating LLM providers.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider from configuration. No network access happens here.
    pub fn create(config: &ProviderConfig) -> Result<Box<dyn LLMProvider>, Error> {
        let timeout = config.settings.request_timeout;
        match config.provider_type {
            ProviderType::Gemini => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| crate::providers::gemini::GEMINI_BASE_URL.to_string());
                let provider = GeminiProvider::with_options(config.api_key.clone(), base_url, timeout)?;
                Ok(Box::new(provider))
            }
            ProviderType::OpenAI => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| crate::providers::openai::OPENAI_BASE_URL.to_string());
                let provider = OpenAIProvider::with_options(config.api_key.clone(), base_url, timeout)?;
                Ok(Box::new(provider))
            }
        }
    }
}
