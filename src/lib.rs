//! Streaming LLM client that translates natural-language questions into SQL text.
//!
//! [`StreamingClient`] turns a context prompt, the conversation so far and
//! generation parameters into a call to Google Gemini or any OpenAI-compatible
//! endpoint, and hands the answer back as a lazy stream of text fragments.
//! [`ChatSession`] keeps the transcript for a front-end and builds the
//! SQL-only directive for every question.

pub mod client;
pub mod error;
pub mod factory;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod response;
pub mod session;
pub mod sse_stream;
pub mod types;

// Re-export core types for easy usage
pub use client::{is_error_fragment, FragmentStream, StreamingClient, TryFragmentStream, ERROR_MARKER};
pub use error::Error;
pub use factory::{ProviderConfig, ProviderFactory, ProviderType};
pub use prompt::{sql_context, SqlContext};
pub use provider::LLMProvider;
pub use providers::*;
pub use response::*;
pub use session::{export_file_name, ChatSession, SessionStats};
pub use sse_stream::SseEvent;
pub use types::*;
