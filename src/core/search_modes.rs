
use serde::{Deserialize, Serialize};
use strum::{EnumString, IntoStaticStr};

use super::config::RagConfig;
use super::error::{RagError, Result};


#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SearchMode {
    /// Single label substring match; no keywords, traversal or re-ranking.
    Simple,

    Embedding,

    #[default]
    Hybrid,
}

impl SearchMode {
    /// `embedding` and `hybrid` share one pipeline.
    #[must_use]
    pub fn uses_keywords(&self) -> bool {
        !matches!(self, Self::Simple)
    }


    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.into()
    }


    pub fn parse(s: &str) -> Result<Self> {
        s.trim()
            .parse()
            .map_err(|_| RagError::invalid(format!("unknown search_mode '{}'", s)))
    }


    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Simple => "Direct label match in the target language",
            Self::Embedding => "Keyword extraction + graph expansion + embedding re-rank",
            Self::Hybrid => "Keyword extraction + graph expansion + embedding re-rank",
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}


fn default_k() -> usize {
    8
}

fn default_include_neighbors() -> bool {
    true
}

fn default_max_hops() -> u32 {
    2
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,

    #[serde(default = "default_k")]
    pub k: usize,

    #[serde(default)]
    pub search_mode: SearchMode,

    #[serde(default = "default_include_neighbors")]
    pub include_neighbors: bool,

    #[serde(default = "default_max_hops")]
    pub max_hops: u32,
}

impl RetrievalRequest {

    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            k: default_k(),
            search_mode: SearchMode::default(),
            include_neighbors: default_include_neighbors(),
            max_hops: default_max_hops(),
        }
    }

    #[must_use]
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.search_mode = mode;
        self
    }

    #[must_use]
    pub fn with_neighbors(mut self, include: bool) -> Self {
        self.include_neighbors = include;
        self
    }

    #[must_use]
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Rejects requests the engine must never send to the network.
    pub fn validate(&self, config: &RagConfig) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(RagError::invalid("query must not be empty"));
        }
        if self.k == 0 {
            return Err(RagError::invalid("k must be at least 1"));
        }
        if self.k > config.max_k {
            return Err(RagError::invalid(format!(
                "k must be at most {}, got {}",
                config.max_k, self.k
            )));
        }
        if self.max_hops == 0 || self.max_hops > config.max_hops_limit {
            return Err(RagError::invalid(format!(
                "max_hops must be within 1..={}, got {}",
                config.max_hops_limit, self.max_hops
            )));
        }
        Ok(())
    }


    #[must_use]
    pub fn candidate_limit(&self) -> usize {
        self.k * 2
    }

    #[must_use]
    pub fn relation_limit(&self) -> usize {
        self.k * 10
    }

    #[must_use]
    pub fn neighbor_limit(&self) -> usize {
        self.k * 5
    }
}
