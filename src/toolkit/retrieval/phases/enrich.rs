

use std::time::Duration;
use tracing::debug;

use super::bounded;
use crate::core::error::Result;
use crate::graph::{Concept, ConceptGraph, ConceptPath, HopRange, Relation, dedup_concepts};
use crate::SHORTEST_PATH_MAX_HOPS;


pub async fn collect_relations(
    graph: &dyn ConceptGraph,
    uris: &[String],
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Relation>> {
    let mut relations = bounded("relations_touching", timeout, graph.relations_touching(uris, limit)).await?;
    relations.truncate(limit);
    Ok(relations)
}


pub async fn expand_neighbors(
    graph: &dyn ConceptGraph,
    uris: &[String],
    max_hops: u32,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<Concept>> {
    let hops = HopRange::new(1, max_hops)?;
    let neighbors = bounded("expand_related", timeout, graph.expand_related(uris, hops, limit)).await?;
    let mut neighbors = dedup_concepts(neighbors);
    neighbors.truncate(limit);
    Ok(neighbors)
}

/// Shortest path between the two leading concepts only. No path within range
/// contributes nothing; a failed or timed-out path query is a retrieval failure.
pub async fn find_paths(graph: &dyn ConceptGraph, concepts: &[Concept], timeout: Duration) -> Result<Vec<ConceptPath>> {
    let [first, second, ..] = concepts else {
        return Ok(Vec::new());
    };

    let lookup = bounded(
        "shortest_path",
        timeout,
        graph.shortest_path(&first.uri, &second.uri, SHORTEST_PATH_MAX_HOPS),
    )
    .await?;

    match lookup {
        Some(path) => {
            debug!("Path {} -> {}: {} hops", first.uri, second.uri, path.hops());
            Ok(vec![path])
        }
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryConceptGraph;

    fn chain() -> InMemoryConceptGraph {
        let mut g = InMemoryConceptGraph::new();
        g.add_concept("c1", "사랑", "ko")
            .add_concept("c2", "감정", "ko")
            .add_concept("c3", "기쁨", "ko")
            .add_concept("c4", "웃음", "ko");
        g.add_relation("c1", "c2", "IsA", 2.0).unwrap();
        g.add_relation("c2", "c3", "RelatedTo", 1.0).unwrap();
        g.add_relation("c3", "c4", "Causes", 3.0).unwrap();
        g
    }

    #[tokio::test]
    async fn test_neighbors_bounded() {
        let g = chain();
        let uris = vec!["c1".to_string()];
        let out = expand_neighbors(&g, &uris, 2, 10, Duration::from_secs(1)).await.unwrap();
        let got: Vec<_> = out.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(got, vec!["c2", "c3"]);

        let limited = expand_neighbors(&g, &uris, 3, 1, Duration::from_secs(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_relations_limit() {
        let g = chain();
        let uris = vec!["c2".to_string(), "c3".to_string()];
        let out = collect_relations(&g, &uris, 2, Duration::from_secs(1)).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].weight, 3.0);
    }

    #[tokio::test]
    async fn test_path_only_between_first_two() {
        let g = chain();
        let concepts = vec![
            Concept::new("c1", "사랑", "ko"),
            Concept::new("c3", "기쁨", "ko"),
            Concept::new("c4", "웃음", "ko"),
        ];
        let paths = find_paths(&g, &concepts, Duration::from_secs(1)).await.unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].labels, vec!["사랑", "감정", "기쁨"]);

        let single = find_paths(&g, &concepts[..1], Duration::from_secs(1)).await.unwrap();
        assert!(single.is_empty());
    }
}
