

use futures::future::try_join_all;
use std::time::Duration;
use tracing::debug;

use super::bounded;
use super::super::models::CandidateSet;
use crate::core::error::Result;
use crate::graph::{Concept, ConceptGraph, HopRange};


/// Direct label hits for one keyword followed by their 1-hop neighbors.
#[derive(Debug, Default)]
struct KeywordHits {
    direct: Vec<Concept>,
    related: Vec<Concept>,
}


async fn hits_for_keyword(
    graph: &dyn ConceptGraph,
    language: &str,
    keyword: &str,
    k: usize,
    timeout: Duration,
) -> Result<KeywordHits> {
    let direct = bounded(
        "match_by_label",
        timeout,
        graph.match_by_label(Some(language), keyword, k),
    )
    .await?;

    if direct.is_empty() {
        return Ok(KeywordHits::default());
    }

    let seeds: Vec<String> = direct.iter().map(|c| c.uri.clone()).collect();
    let related = bounded(
        "expand_related",
        timeout,
        graph.expand_related(&seeds, HopRange::ONE, k),
    )
    .await?;

    debug!(
        "Keyword '{}': {} direct, {} related",
        crate::safe_truncate(keyword, 20),
        direct.len(),
        related.len()
    );
    Ok(KeywordHits { direct, related })
}

/// Looks keywords up concurrently, then merges in keyword order so that an
/// earlier keyword's hits always precede a later keyword's, whatever finished first.
pub async fn gather_candidates(
    graph: &dyn ConceptGraph,
    language: &str,
    keywords: &[String],
    k: usize,
    timeout: Duration,
) -> Result<Vec<Concept>> {
    let lookups = keywords
        .iter()
        .map(|keyword| hits_for_keyword(graph, language, keyword, k, timeout));
    let per_keyword = try_join_all(lookups).await?;

    let mut candidates = CandidateSet::new();
    for hits in per_keyword {
        candidates.extend(hits.direct);
        candidates.extend(hits.related);
    }

    debug!("Gathered {} candidates from {} keywords", candidates.len(), keywords.len());
    Ok(candidates.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConceptPath, GraphError, GraphStatistics, InMemoryConceptGraph, Relation};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Label lookups finish later the earlier their keyword appears in `order`.
    struct StaggeredGraph {
        inner: InMemoryConceptGraph,
        order: Vec<String>,
        finished: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ConceptGraph for StaggeredGraph {
        async fn match_by_label(&self, language: Option<&str>, substring: &str, limit: usize) -> std::result::Result<Vec<Concept>, GraphError> {
            let rank = self.order.iter().position(|k| k == substring).unwrap_or(0);
            let delay = (self.order.len() - rank) as u64 * 30;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.finished.lock().push(substring.to_string());
            self.inner.match_by_label(language, substring, limit).await
        }
        async fn expand_related(&self, uris: &[String], hops: HopRange, limit: usize) -> std::result::Result<Vec<Concept>, GraphError> {
            self.inner.expand_related(uris, hops, limit).await
        }
        async fn relations_touching(&self, uris: &[String], limit: usize) -> std::result::Result<Vec<Relation>, GraphError> {
            self.inner.relations_touching(uris, limit).await
        }
        async fn shortest_path(&self, from: &str, to: &str, max_hops: u32) -> std::result::Result<Option<ConceptPath>, GraphError> {
            self.inner.shortest_path(from, to, max_hops).await
        }
        async fn statistics(&self) -> std::result::Result<GraphStatistics, GraphError> {
            self.inner.statistics().await
        }
        async fn health(&self) -> std::result::Result<(), GraphError> {
            self.inner.health().await
        }
    }

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_missing_keyword_contributes_nothing() {
        let mut g = InMemoryConceptGraph::new();
        g.add_concept("c9", "감정", "ko").add_concept("c10", "기분", "ko");
        g.add_relation("c9", "c10", "RelatedTo", 1.0).unwrap();

        let out = gather_candidates(&g, "ko", &kw(&["사랑", "감정"]), 4, Duration::from_secs(1))
            .await
            .unwrap();
        let uris: Vec<_> = out.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(uris, vec!["c9", "c10"]);
    }

    #[tokio::test]
    async fn test_interleaves_direct_and_related_per_keyword() {
        let mut g = InMemoryConceptGraph::new();
        g.add_concept("a1", "사랑", "ko")
            .add_concept("a2", "연애", "ko")
            .add_concept("b1", "감정", "ko")
            .add_concept("b2", "기분", "ko");
        g.add_relation("a1", "a2", "RelatedTo", 1.0).unwrap();
        g.add_relation("b1", "b2", "RelatedTo", 1.0).unwrap();
        g.add_relation("b1", "a2", "RelatedTo", 1.0).unwrap();

        let out = gather_candidates(&g, "ko", &kw(&["사랑", "감정"]), 4, Duration::from_secs(1))
            .await
            .unwrap();
        let uris: Vec<_> = out.iter().map(|c| c.uri.as_str()).collect();
        // a2 is also a neighbor of b1 but was already placed by the first keyword.
        assert_eq!(uris, vec!["a1", "a2", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_merge_follows_keyword_order_not_completion() {
        let mut g = InMemoryConceptGraph::new();
        g.add_concept("a1", "사랑", "ko")
            .add_concept("a2", "연애", "ko")
            .add_concept("b1", "감정", "ko")
            .add_concept("b2", "기분", "ko")
            .add_concept("d1", "기쁨", "ko");
        g.add_relation("a1", "a2", "RelatedTo", 1.0).unwrap();
        g.add_relation("b1", "b2", "RelatedTo", 1.0).unwrap();
        let keywords = kw(&["사랑", "감정", "기쁨"]);
        let graph = StaggeredGraph {
            inner: g,
            order: keywords.clone(),
            finished: Mutex::new(Vec::new()),
        };

        let out = gather_candidates(&graph, "ko", &keywords, 4, Duration::from_secs(2))
            .await
            .unwrap();

        assert_eq!(*graph.finished.lock(), kw(&["기쁨", "감정", "사랑"]));
        let uris: Vec<_> = out.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(uris, vec!["a1", "a2", "b1", "b2", "d1"]);
    }

    #[tokio::test]
    async fn test_language_filter_applies() {
        let mut g = InMemoryConceptGraph::new();
        g.add_concept("e1", "love", "en").add_concept("k1", "love", "ko");
        let out = gather_candidates(&g, "ko", &kw(&["love"]), 4, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].uri, "k1");
    }

    #[tokio::test]
    async fn test_no_keywords_no_candidates() {
        let g = InMemoryConceptGraph::new();
        let out = gather_candidates(&g, "ko", &[], 4, Duration::from_secs(1)).await.unwrap();
        assert!(out.is_empty());
    }
}
