//! Graph Query Gateway.
//!
//! Read-only, bounded queries against the concept graph. Every call carries an
//! explicit limit or hop bound; nothing here issues an unbounded traversal.

pub mod helix;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub use helix::HelixConceptGraph;
pub use memory::InMemoryConceptGraph;


#[derive(Error, Debug, Clone)]
pub enum GraphError {
    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Graph query failed: {0}")]
    Query(String),

    #[error("Malformed graph response: {0}")]
    Malformed(String),

    #[error("Invalid graph argument: {0}")]
    InvalidArgument(String),
}


/// A labeled, language-tagged node. `uri` is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Concept {
    pub uri: String,
    pub label: String,
    #[serde(alias = "lang")]
    pub language: String,
}

impl Concept {
    pub fn new(uri: impl Into<String>, label: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            language: language.into(),
        }
    }
}


/// Directed, typed, weighted edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "type", alias = "rel_type")]
    pub rel_type: String,
    pub weight: f64,
    #[serde(alias = "start_uri")]
    pub start: String,
    #[serde(alias = "end_uri")]
    pub end: String,
    pub start_label: String,
    pub end_label: String,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptPath {
    #[serde(alias = "node_labels")]
    pub labels: Vec<String>,
    #[serde(alias = "rel_types")]
    pub relation_types: Vec<String>,
}

impl ConceptPath {
    #[must_use]
    pub fn hops(&self) -> usize {
        self.relation_types.len()
    }

    /// `a --[IsA]--> b --[RelatedTo]--> c`
    #[must_use]
    pub fn render(&self) -> String {
        let Some(first) = self.labels.first() else {
            return String::new();
        };
        let mut out = first.clone();
        for (rel, label) in self.relation_types.iter().zip(self.labels.iter().skip(1)) {
            out.push_str(&format!(" --[{}]--> {}", rel, label));
        }
        out
    }
}


/// Inclusive hop bounds for neighbor expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HopRange {
    pub min: u32,
    pub max: u32,
}

impl HopRange {
    pub fn new(min: u32, max: u32) -> Result<Self, GraphError> {
        if min == 0 || min > max {
            return Err(GraphError::InvalidArgument(format!(
                "hop range must satisfy 1 <= min <= max, got {}..={}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Direct neighbors only.
    pub const ONE: HopRange = HopRange { min: 1, max: 1 };

    #[must_use]
    pub fn contains(&self, hops: u32) -> bool {
        hops >= self.min && hops <= self.max
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageCount {
    #[serde(alias = "lang")]
    pub language: String,
    #[serde(alias = "cnt")]
    pub count: u64,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_concepts: u64,
    pub total_relations: u64,
    pub concepts_by_language: Vec<LanguageCount>,
}


#[async_trait]
pub trait ConceptGraph: Send + Sync {
    /// Case-insensitive label substring match, optionally scoped to one language.
    async fn match_by_label(
        &self,
        language: Option<&str>,
        substring: &str,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError>;

    /// Concepts reachable from any seed within `hops`, seeds excluded, unique by URI.
    async fn expand_related(
        &self,
        uris: &[String],
        hops: HopRange,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError>;

    /// Relations with either endpoint in `uris`, heaviest first.
    async fn relations_touching(&self, uris: &[String], limit: usize) -> Result<Vec<Relation>, GraphError>;


    async fn shortest_path(
        &self,
        from_uri: &str,
        to_uri: &str,
        max_hops: u32,
    ) -> Result<Option<ConceptPath>, GraphError>;


    async fn statistics(&self) -> Result<GraphStatistics, GraphError>;


    async fn health(&self) -> Result<(), GraphError>;
}


/// Keeps the first occurrence of every URI, preserving order.
pub fn dedup_concepts(concepts: impl IntoIterator<Item = Concept>) -> Vec<Concept> {
    let mut seen = HashSet::new();
    concepts
        .into_iter()
        .filter(|c| seen.insert(c.uri.clone()))
        .collect()
}


/// Stable weight-descending order; ties keep store order.
pub fn sort_by_weight_desc(relations: &mut [Relation]) {
    relations.sort_by(|a, b| b.weight.total_cmp(&a.weight));
}
