

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::search_modes::SearchMode;
use crate::graph::{Concept, ConceptPath, Relation};
use crate::llm::keywords::KeywordSource;


/// Assembled context for one query. Safe to cache and replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Relevance order (insertion order unless `reranked`).
    pub concepts: Vec<Concept>,
    /// Heaviest first.
    pub relations: Vec<Relation>,
    pub neighbors: Vec<Concept>,
    #[serde(default)]
    pub paths: Vec<ConceptPath>,
    pub keywords: Vec<String>,
    pub search_mode: SearchMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_source: Option<KeywordSource>,
    #[serde(default)]
    pub reranked: bool,
    /// Built from fallback keywords, or a due re-rank was skipped.
    #[serde(default)]
    pub degraded: bool,
}

impl RetrievalResult {

    pub fn empty(search_mode: SearchMode, keywords: Vec<String>) -> Self {
        Self {
            concepts: Vec::new(),
            relations: Vec::new(),
            neighbors: Vec::new(),
            paths: Vec::new(),
            keywords,
            search_mode,
            keyword_source: None,
            reranked: false,
            degraded: false,
        }
    }

    pub fn concept_uris(&self) -> Vec<String> {
        self.concepts.iter().map(|c| c.uri.clone()).collect()
    }
}


/// Insertion-ordered set of concepts keyed by URI; first occurrence wins.
#[derive(Debug, Default)]
pub struct CandidateSet {
    items: Vec<Concept>,
    seen: HashSet<String>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the concept was new.
    pub fn insert(&mut self, concept: Concept) -> bool {
        if self.seen.contains(&concept.uri) {
            return false;
        }
        self.seen.insert(concept.uri.clone());
        self.items.push(concept);
        true
    }

    pub fn extend(&mut self, concepts: impl IntoIterator<Item = Concept>) {
        for concept in concepts {
            self.insert(concept);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Concept> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_set_first_wins() {
        let mut set = CandidateSet::new();
        assert!(set.insert(Concept::new("c1", "사랑", "ko")));
        assert!(!set.insert(Concept::new("c1", "사랑2", "ko")));
        set.extend(vec![Concept::new("c2", "감정", "ko"), Concept::new("c1", "x", "ko")]);
        let items = set.into_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, "사랑");
        assert_eq!(items[1].uri, "c2");
    }

    #[test]
    fn test_result_serializes_mode_lowercase() {
        let result = RetrievalResult::empty(SearchMode::Hybrid, vec!["사랑".to_string()]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["search_mode"], "hybrid");
        assert_eq!(json["keywords"][0], "사랑");
        assert!(json.get("keyword_source").is_none());

        let back: RetrievalResult = serde_json::from_value(json).unwrap();
        assert_eq!(back, result);
    }
}
