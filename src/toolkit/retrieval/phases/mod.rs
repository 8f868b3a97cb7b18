

pub mod candidates;
pub mod enrich;
pub mod rerank;

use std::future::Future;
use std::time::Duration;

use crate::core::error::{RagError, Result};
use crate::graph::GraphError;

pub use candidates::gather_candidates;
pub use enrich::{collect_relations, expand_neighbors, find_paths};
pub use rerank::rerank_candidates;


/// Applies the per-call deadline to a graph query. Timeouts and store errors
/// both surface; neither becomes an empty result.
pub(crate) async fn bounded<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, GraphError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(RagError::from),
        Err(_) => Err(RagError::Timeout {
            operation: operation.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}
