

use helix_rs::{HelixDB, HelixDBClient, HelixError};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::config::RagConfig;


const MAX_RETRIES: u32 = 3;

const INITIAL_RETRY_DELAY_MS: u64 = 100;

const MAX_RETRY_DELAY_MS: u64 = 2000;


#[derive(Debug, Error)]
pub enum HelixClientError {
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Helix error: {0}")]
    Helix(#[from] HelixError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Retry exhausted after {0} attempts: {1}")]
    RetryExhausted(u32, String),
}


/// Thin wrapper over the HelixDB SDK. Shared behind an `Arc`; the SDK client
/// pools its own connections.
pub struct HelixClient {
    inner: HelixDB,
    base_url: String,
}

impl HelixClient {

    pub fn new(host: &str, port: u16) -> Self {
        let endpoint = format!("http://{}", host);
        let base_url = format!("http://{}:{}", host, port);

        let inner = <HelixDB as HelixDBClient>::new(Some(&endpoint), Some(port), None);

        info!("HelixClient created for {}", base_url);

        Self { inner, base_url }
    }


    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(&config.graph_host, config.graph_port)
    }

    /// Runs a named query, retrying transient failures with exponential backoff.
    /// "Not found" answers are returned immediately.
    pub async fn execute_query<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        let mut last_error = None;
        let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);

        for attempt in 1..=MAX_RETRIES {
            debug!("Executing query: {} (attempt {})", query_name, attempt);

            match self.inner.query::<P, T>(query_name, params).await {
                Ok(result) => {
                    debug!("Query {} succeeded", query_name);
                    return Ok(result);
                }
                Err(e) => {
                    let err_str = e.to_string();

                    if err_str.contains("not found") || err_str.contains("No value") {
                        debug!("Query {} returned not found", query_name);
                        return Err(HelixClientError::Query(err_str));
                    }

                    debug!("Query {} failed (attempt {}): {}", query_name, attempt, e);
                    last_error = Some(err_str);

                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(delay).await;
                        delay = (delay * 2).min(Duration::from_millis(MAX_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(HelixClientError::RetryExhausted(
            MAX_RETRIES,
            last_error.unwrap_or_else(|| "Unknown error".to_string()),
        ))
    }


    pub async fn execute_query_no_retry<T, P>(&self, query_name: &str, params: &P) -> Result<T, HelixClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        self.inner
            .query::<P, T>(query_name, params)
            .await
            .map_err(|e| HelixClientError::Query(e.to_string()))
    }


    pub async fn health_check(&self) -> Result<(), HelixClientError> {
        match self
            .execute_query_no_retry::<serde_json::Value, _>("health", &serde_json::json!({}))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                // A server that answers "unknown query" is alive.
                if err_str.contains("404")
                    || err_str.contains("not found")
                    || err_str.contains("couldn't find")
                {
                    Ok(())
                } else {
                    Err(e)
                }
            }
        }
    }


    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
