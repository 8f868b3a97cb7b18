

use futures::stream::{self, StreamExt};
use std::cmp::Ordering;
use tracing::{debug, info};

use crate::graph::Concept;
use crate::llm::embeddings::EmbeddingClient;


/// Outcome of the optional re-ranking step.
#[derive(Debug)]
pub struct Reranked {
    pub concepts: Vec<Concept>,
    pub reranked: bool,
    /// A re-rank was due but the query could not be embedded.
    pub degraded: bool,
}


fn by_score_desc(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Re-ranks by cosine similarity to the query only when there are more than
/// `limit` candidates. Without a query embedding the insertion order is kept.
/// Candidates whose label could not be embedded go last.
pub async fn rerank_candidates(
    embeddings: &EmbeddingClient,
    query: &str,
    candidates: Vec<Concept>,
    limit: usize,
    concurrency: usize,
) -> Reranked {
    if candidates.len() <= limit {
        return Reranked {
            concepts: candidates,
            reranked: false,
            degraded: false,
        };
    }

    let query_embedding = embeddings.embed(query).await;
    if query_embedding.is_empty() {
        info!(
            "Query embedding unavailable, keeping first {} of {} candidates",
            limit,
            candidates.len()
        );
        let mut concepts = candidates;
        concepts.truncate(limit);
        return Reranked {
            concepts,
            reranked: false,
            degraded: true,
        };
    }

    let total = candidates.len();
    let query_embedding = &query_embedding;
    let mut scored: Vec<(Concept, Option<f64>)> = stream::iter(candidates)
        .map(|concept| async move {
            let label_embedding = embeddings.embed(&concept.label).await;
            let score = if label_embedding.is_empty() {
                None
            } else {
                Some(embeddings.similarity(query_embedding, &label_embedding))
            };
            (concept, score)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    scored.sort_by(|a, b| by_score_desc(&a.1, &b.1));
    scored.truncate(limit);

    debug!("Re-ranked {} candidates down to {}", total, scored.len());
    Reranked {
        concepts: scored.into_iter().map(|(c, _)| c).collect(),
        reranked: true,
        degraded: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::ResultCache;
    use crate::llm::embeddings::tests::TableEmbedder;
    use std::sync::Arc;
    use std::sync::atomic::Ordering as AtomicOrdering;

    fn concepts(labels: &[&str]) -> Vec<Concept> {
        labels
            .iter()
            .enumerate()
            .map(|(i, l)| Concept::new(format!("c{}", i), *l, "ko"))
            .collect()
    }

    fn client(embedder: Arc<TableEmbedder>) -> EmbeddingClient {
        EmbeddingClient::new(embedder, Arc::new(ResultCache::disabled()))
    }

    #[tokio::test]
    async fn test_small_sets_skip_embedding() {
        let embedder = Arc::new(TableEmbedder::new(&[]));
        let out = rerank_candidates(&client(embedder.clone()), "q", concepts(&["a", "b"]), 2, 4).await;
        assert!(!out.reranked);
        assert!(!out.degraded);
        assert_eq!(out.concepts.len(), 2);
        assert_eq!(embedder.calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_query_embedding_truncates_in_order() {
        let embedder = Arc::new(TableEmbedder::new(&[("a", vec![1.0])]));
        let out = rerank_candidates(&client(embedder), "q", concepts(&["a", "b", "c"]), 2, 4).await;
        assert!(!out.reranked);
        assert!(out.degraded);
        let labels: Vec<_> = out.concepts.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sorts_by_similarity_unknown_last() {
        let embedder = Arc::new(TableEmbedder::new(&[
            ("q", vec![1.0, 0.0]),
            ("far", vec![-1.0, 0.0]),
            ("near", vec![1.0, 0.1]),
            ("mid", vec![0.5, 0.5]),
        ]));
        let out = rerank_candidates(
            &client(embedder),
            "q",
            concepts(&["unknown", "far", "mid", "near"]),
            3,
            2,
        )
        .await;
        assert!(out.reranked);
        let labels: Vec<_> = out.concepts.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["near", "mid", "far"]);
    }

    #[test]
    fn test_score_order_is_stable_for_ties() {
        let mut items = vec![("x", Some(0.5)), ("y", None), ("z", Some(0.5)), ("w", Some(0.9))];
        items.sort_by(|a, b| by_score_desc(&a.1, &b.1));
        let order: Vec<_> = items.iter().map(|i| i.0).collect();
        assert_eq!(order, vec!["w", "x", "z", "y"]);
    }
}
