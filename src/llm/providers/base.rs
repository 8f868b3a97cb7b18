

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum LlmProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    Provider(String),
}


#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl GenerateOptions {
    pub fn new(temperature: f64, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}


/// Non-streaming text generation endpoint.
#[async_trait]
pub trait LlmProvider: Send + Sync {

    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmProviderError>;


    fn provider_name(&self) -> &str;


    fn model_name(&self) -> &str;

    /// Liveness probe for health reporting.
    async fn health(&self) -> Result<(), LlmProviderError> {
        Ok(())
    }
}


#[async_trait]
impl LlmProvider for Arc<dyn LlmProvider> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmProviderError> {
        (**self).generate(prompt, options).await
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn health(&self) -> Result<(), LlmProviderError> {
        (**self).health().await
    }
}
