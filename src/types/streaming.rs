//! Types for streaming responses.

use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// Events that can be emitted during streaming.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of content was received.
    ContentDelta { delta: String },
    /// The stream has finished.
    Done {
        finish_reason: FinishReason,
        usage: Usage,
    },
    /// The provider reported an error inside the stream.
    Error { error: String },
}

/// Reason why generation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
        }
    }

    /// Map a Gemini `finishReason` value. Unknown values count as a normal stop.
    pub fn from_gemini(reason: &str) -> Self {
        match reason {
            "MAX_TOKENS" => FinishReason::Length,
            "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" => {
                FinishReason::ContentFilter
            }
            _ => FinishReason::Stop,
        }
    }

    /// Map an OpenAI chat-completions `finish_reason` value.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}
