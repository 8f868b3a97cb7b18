

pub mod base;
pub mod ollama;

pub use base::{GenerateOptions, LlmProvider, LlmProviderError};
pub use ollama::OllamaProvider;
