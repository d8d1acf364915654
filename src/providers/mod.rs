//! Provider implementations for different LLM services.

pub mod gemini;
pub mod openai;
pub mod stub;

// Re-export commonly used provider types
pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use stub::StubProvider;
