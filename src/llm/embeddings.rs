

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::cache::{CachePrefix, ResultCache};


#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Empty text")]
    EmptyText,
}


#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}


/// One outbound call per invocation, no retries.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn model_name(&self) -> &str;
}


pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
}

impl OllamaEmbedder {

    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        let client = Client::builder().timeout(timeout).build()?;
        info!("OllamaEmbedder initialized: model={}, url={}", model, base_url);
        Ok(Self {
            base_url,
            model,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyText);
        }

        let request = OllamaEmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()
            .map_err(EmbeddingError::Http)?
            .json::<OllamaEmbeddingResponse>()
            .await?;

        if response.embedding.iter().any(|v| !v.is_finite()) {
            return Err(EmbeddingError::InvalidResponse("non-finite component".to_string()));
        }
        Ok(response.embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}


/// Cosine similarity in `[-1, 1]`. Empty, mismatched or zero-norm input scores `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)
}


/// Embedding calls that never fail: an error yields an empty vector, which
/// callers read as "similarity unknown". Successful vectors are cached.
#[derive(Clone)]
pub struct EmbeddingClient {
    embedder: Arc<dyn Embedder>,
    cache: Arc<ResultCache>,
}

impl EmbeddingClient {
    pub fn new(embedder: Arc<dyn Embedder>, cache: Arc<ResultCache>) -> Self {
        Self { embedder, cache }
    }

    fn cache_key(&self, text: &str) -> String {
        format!("{}\u{1f}{}", self.embedder.model_name(), text)
    }


    pub async fn embed(&self, text: &str) -> Vec<f32> {
        let key = self.cache_key(text);
        if let Ok(Some(cached)) = self.cache.get::<Vec<f32>>(CachePrefix::Embedding, &key).await {
            debug!("Embedding cache HIT for: {}", crate::safe_truncate(text, 30));
            return cached;
        }

        match self.embedder.embed(text).await {
            Ok(vector) => {
                if !vector.is_empty() {
                    // Fail open: a cache write error only costs a future call.
                    let _ = self.cache.put(CachePrefix::Embedding, &key, &vector).await;
                }
                vector
            }
            Err(e) => {
                warn!("Embedding failed for '{}': {}", crate::safe_truncate(text, 30), e);
                Vec::new()
            }
        }
    }


    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f64 {
        cosine_similarity(a, b)
    }
}
