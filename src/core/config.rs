

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::error::{RagError, Result};

/// Environment variable naming an optional configuration file.
pub const CONFIG_FILE_ENV: &str = "CONCEPTRAG_CONFIG";

const ENV_PREFIX: &str = "CONCEPTRAG";


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {

    pub graph_host: String,
    pub graph_port: u16,
    pub graph_timeout_secs: u64,


    pub ollama_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub keyword_timeout_secs: u64,
    pub embedding_timeout_secs: u64,
    pub llm_timeout_secs: u64,
    pub llm_temperature: f64,
    pub llm_max_tokens: u32,


    pub language: String,
    pub default_k: usize,
    pub max_k: usize,
    pub default_max_hops: u32,
    pub max_hops_limit: u32,
    pub rerank_concurrency: usize,


    pub cache_enabled: bool,
    pub cache_capacity: usize,
    pub cache_connect_retries: u32,
    pub ttl_search_secs: u64,
    pub ttl_llm_response_secs: u64,
    pub ttl_embedding_secs: u64,
    pub ttl_stats_secs: u64,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            graph_host: "localhost".to_string(),
            graph_port: crate::DEFAULT_HELIX_PORT,
            graph_timeout_secs: 30,

            ollama_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            llm_model: crate::DEFAULT_LLM_MODEL.to_string(),
            embedding_model: crate::DEFAULT_LLM_MODEL.to_string(),
            keyword_timeout_secs: 30,
            embedding_timeout_secs: 30,
            llm_timeout_secs: 120,
            llm_temperature: 0.7,
            llm_max_tokens: 512,

            language: crate::DEFAULT_LANGUAGE.to_string(),
            default_k: 8,
            max_k: 100,
            default_max_hops: 2,
            max_hops_limit: 5,
            rerank_concurrency: 8,

            cache_enabled: true,
            cache_capacity: crate::DEFAULT_CACHE_CAPACITY,
            cache_connect_retries: 3,
            ttl_search_secs: 3600,
            ttl_llm_response_secs: 7200,
            ttl_embedding_secs: 86400,
            ttl_stats_secs: 300,
        }
    }
}

impl RagConfig {
    /// Defaults, then the file named by `CONCEPTRAG_CONFIG` (if set), then
    /// `CONCEPTRAG_*` environment variables.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref())
    }


    pub fn load_from(file: Option<&str>) -> Result<Self> {
        let defaults = Config::try_from(&Self::default())
            .map_err(|e| RagError::Config(e.to_string()))?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = file {
            builder = builder.add_source(File::with_name(path).required(true));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| RagError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }


    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.ollama_url)
            .map_err(|e| RagError::Config(format!("ollama_url '{}': {}", self.ollama_url, e)))?;
        Url::parse(&self.graph_base_url())
            .map_err(|e| RagError::Config(format!("graph_host '{}': {}", self.graph_host, e)))?;

        if self.graph_timeout_secs == 0
            || self.keyword_timeout_secs == 0
            || self.embedding_timeout_secs == 0
            || self.llm_timeout_secs == 0
        {
            return Err(RagError::Config("timeouts must be at least 1 second".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(RagError::Config("cache_capacity must be positive".to_string()));
        }
        if self.max_k == 0 || self.default_k == 0 || self.default_k > self.max_k {
            return Err(RagError::Config(format!(
                "default_k must be within 1..={}, got {}",
                self.max_k, self.default_k
            )));
        }
        if self.default_max_hops == 0 || self.default_max_hops > self.max_hops_limit {
            return Err(RagError::Config(format!(
                "default_max_hops must be within 1..={}, got {}",
                self.max_hops_limit, self.default_max_hops
            )));
        }
        if self.rerank_concurrency == 0 {
            return Err(RagError::Config("rerank_concurrency must be positive".to_string()));
        }
        Ok(())
    }


    pub fn graph_base_url(&self) -> String {
        format!("http://{}:{}", self.graph_host, self.graph_port)
    }

    pub fn graph_timeout(&self) -> Duration {
        Duration::from_secs(self.graph_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RagConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_k, 8);
        assert_eq!(config.language, "ko");
        assert_eq!(config.graph_base_url(), "http://localhost:6969");
    }

    #[test]
    fn test_rejects_bad_url() {
        let config = RagConfig {
            ollama_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RagError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = RagConfig {
            graph_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_default_k_above_max() {
        let config = RagConfig {
            default_k: 200,
            max_k: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = RagConfig::load_from(None).unwrap();
        assert_eq!(config.ttl_embedding_secs, 86400);
        assert_eq!(config.rerank_concurrency, 8);
    }
}
