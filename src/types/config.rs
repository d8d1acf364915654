use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Error;

/// Default Gemini model bound at construction.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default cap on generated output tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
/// Accepted temperature range.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.0..=2.0;

/// Static configuration bound to a client for its whole lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Provider model identifier.
    pub model: String,
    /// Temperature used when a call does not override it.
    pub temperature: f32,
    /// Output cap used when a call does not override it.
    pub max_tokens: u32,
    /// Deadline for one provider call, including the streamed body.
    pub request_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl Settings {
    /// Settings with a different model and otherwise default values.
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }
}

/// Per-call generation parameters. Unset values fall back to [`Settings`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Resolve against the bound settings and validate the result.
    pub fn resolve(&self, settings: &Settings) -> Result<(f32, u32), Error> {
        let temperature = self.temperature.unwrap_or(settings.temperature);
        let max_tokens = self.max_tokens.unwrap_or(settings.max_tokens);

        if !temperature.is_finite() || !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(Error::config(format!(
                "temperature must be between {} and {}, got {temperature}",
                TEMPERATURE_RANGE.start(),
                TEMPERATURE_RANGE.end()
            )));
        }
        if max_tokens == 0 {
            return Err(Error::config("max_tokens must be a positive integer"));
        }

        Ok((temperature, max_tokens))
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One call to a provider, as handed to [`crate::LLMProvider::generate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMRequest {
    pub model: String,
    /// System/task instructions.
    pub context: String,
    /// Prior turns in chronological order.
    pub history: Vec<super::message::Turn>,
    pub temperature: f32,
    pub max_tokens: u32,
}
