

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    ConceptGraph, Concept, ConceptPath, GraphError, GraphStatistics, HopRange, Relation, dedup_concepts,
    sort_by_weight_desc,
};
use crate::db::{HelixClient, HelixClientError};


const Q_MATCH_BY_LABEL: &str = "matchConceptsByLabel";
const Q_EXPAND_RELATED: &str = "expandRelatedConcepts";
const Q_RELATIONS_TOUCHING: &str = "relationsTouching";
const Q_SHORTEST_PATH: &str = "conceptShortestPath";
const Q_STATISTICS: &str = "conceptStatistics";


#[derive(Debug, Deserialize)]
struct ConceptRows {
    #[serde(default)]
    concepts: Vec<Concept>,
}

#[derive(Debug, Deserialize)]
struct RelationRows {
    #[serde(default)]
    relations: Vec<Relation>,
}

#[derive(Debug, Deserialize)]
struct PathRow {
    #[serde(default)]
    path: Option<ConceptPath>,
}

#[derive(Debug, Serialize)]
struct MatchParams<'a> {
    language: &'a str,
    substring: String,
    limit: usize,
}

#[derive(Debug, Serialize)]
struct ExpandParams<'a> {
    uris: &'a [String],
    min_hops: u32,
    max_hops: u32,
    limit: usize,
}


/// Gateway backed by HelixDB named queries.
pub struct HelixConceptGraph {
    client: Arc<HelixClient>,
}

impl HelixConceptGraph {
    pub fn new(client: Arc<HelixClient>) -> Self {
        Self { client }
    }

    fn map_client_error(query: &str, err: HelixClientError) -> GraphError {
        match err {
            HelixClientError::RetryExhausted(attempts, msg) => {
                GraphError::Unavailable(format!("{} after {} attempts: {}", query, attempts, msg))
            }
            HelixClientError::Serialization(e) => GraphError::Malformed(format!("{}: {}", query, e)),
            other => GraphError::Query(format!("{}: {}", query, other)),
        }
    }

    async fn run<T, P>(&self, query: &str, params: &P) -> Result<T, GraphError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let raw: Value = self
            .client
            .execute_query(query, params)
            .await
            .map_err(|e| Self::map_client_error(query, e))?;

        serde_json::from_value(raw).map_err(|e| {
            warn!("Malformed response from {}: {}", query, e);
            GraphError::Malformed(format!("{}: {}", query, e))
        })
    }
}

#[async_trait]
impl ConceptGraph for HelixConceptGraph {
    async fn match_by_label(
        &self,
        language: Option<&str>,
        substring: &str,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError> {
        let needle = substring.to_lowercase();
        let params = MatchParams {
            language: language.unwrap_or(""),
            substring: needle.clone(),
            limit,
        };
        let rows: ConceptRows = self.run(Q_MATCH_BY_LABEL, &params).await?;

        // Hold the store to the contract even if the stored query drifts.
        let concepts: Vec<Concept> = dedup_concepts(rows.concepts.into_iter().filter(|c| {
            language.is_none_or(|lang| c.language == lang) && c.label.to_lowercase().contains(&needle)
        }))
        .into_iter()
        .take(limit)
        .collect();

        debug!("{} '{}' -> {} concepts", Q_MATCH_BY_LABEL, crate::safe_truncate(substring, 30), concepts.len());
        Ok(concepts)
    }

    async fn expand_related(
        &self,
        uris: &[String],
        hops: HopRange,
        limit: usize,
    ) -> Result<Vec<Concept>, GraphError> {
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        let params = ExpandParams {
            uris,
            min_hops: hops.min,
            max_hops: hops.max,
            limit,
        };
        let rows: ConceptRows = self.run(Q_EXPAND_RELATED, &params).await?;

        let seeds: HashSet<&str> = uris.iter().map(String::as_str).collect();
        let concepts: Vec<Concept> = dedup_concepts(
            rows.concepts
                .into_iter()
                .filter(|c| !seeds.contains(c.uri.as_str())),
        )
        .into_iter()
        .take(limit)
        .collect();

        debug!("{} from {} seeds -> {} concepts", Q_EXPAND_RELATED, uris.len(), concepts.len());
        Ok(concepts)
    }

    async fn relations_touching(&self, uris: &[String], limit: usize) -> Result<Vec<Relation>, GraphError> {
        if uris.is_empty() {
            return Ok(Vec::new());
        }
        let rows: RelationRows = self
            .run(Q_RELATIONS_TOUCHING, &json!({ "uris": uris, "limit": limit }))
            .await?;

        let mut relations = rows.relations;
        sort_by_weight_desc(&mut relations);
        relations.truncate(limit);
        Ok(relations)
    }

    async fn shortest_path(
        &self,
        from_uri: &str,
        to_uri: &str,
        max_hops: u32,
    ) -> Result<Option<ConceptPath>, GraphError> {
        let params = json!({ "from_uri": from_uri, "to_uri": to_uri, "max_hops": max_hops });
        let result: Result<PathRow, GraphError> = self.run(Q_SHORTEST_PATH, &params).await;

        match result {
            Ok(row) => Ok(row.path.filter(|p| p.hops() as u32 <= max_hops && !p.labels.is_empty())),
            // The store reports "no path" as a not-found answer.
            Err(GraphError::Query(msg)) if msg.contains("not found") || msg.contains("No value") => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn statistics(&self) -> Result<GraphStatistics, GraphError> {
        let mut stats: GraphStatistics = self.run(Q_STATISTICS, &json!({})).await?;
        stats
            .concepts_by_language
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.language.cmp(&b.language)));
        Ok(stats)
    }

    async fn health(&self) -> Result<(), GraphError> {
        self.client
            .health_check()
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))
    }
}
