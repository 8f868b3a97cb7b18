

use thiserror::Error;

use crate::graph::GraphError;
use crate::llm::providers::LlmProviderError;


#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Graph query failed: {0}")]
    Graph(#[from] GraphError),

    #[error("Operation timed out after {secs}s: {operation}")]
    Timeout { operation: String, secs: u64 },

    #[error("LLM provider error: {0}")]
    Llm(#[from] LlmProviderError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RagError {

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }


    #[must_use]
    pub fn is_retrieval_failure(&self) -> bool {
        matches!(self, Self::Graph(_) | Self::Timeout { .. })
    }
}


pub type Result<T> = std::result::Result<T, RagError>;
