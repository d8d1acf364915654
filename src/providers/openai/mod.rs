pub mod client;
pub mod types;

pub use client::{OpenAIProvider, OPENAI_BASE_URL};
