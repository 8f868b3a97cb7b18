//! Retrieval orchestration.
//!
//! One request runs: validation, cache lookup, strategy selection, keyword
//! extraction, candidate gathering, optional embedding re-rank, then relation,
//! neighbor and path enrichment. Nothing is kept between requests except what
//! the result cache holds.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use super::models::RetrievalResult;
use super::phases::{collect_relations, expand_neighbors, find_paths, gather_candidates, rerank_candidates};
use crate::core::cache::{CachePrefix, ResultCache, canonical_key_input};
use crate::core::config::RagConfig;
use crate::core::error::{RagError, Result};
use crate::core::instrument::timed;
use crate::core::metrics::PerformanceTracker;
use crate::core::search_modes::{RetrievalRequest, SearchMode};
use crate::graph::ConceptGraph;
use crate::llm::embeddings::EmbeddingClient;
use crate::llm::keywords::{KeywordExtractor, KeywordSource};


pub struct ConceptRetriever {
    graph: Arc<dyn ConceptGraph>,
    keywords: KeywordExtractor,
    embeddings: EmbeddingClient,
    cache: Arc<ResultCache>,
    tracker: Arc<PerformanceTracker>,
    config: Arc<RagConfig>,
}

impl ConceptRetriever {
    pub fn new(
        graph: Arc<dyn ConceptGraph>,
        keywords: KeywordExtractor,
        embeddings: EmbeddingClient,
        cache: Arc<ResultCache>,
        tracker: Arc<PerformanceTracker>,
        config: Arc<RagConfig>,
    ) -> Self {
        Self {
            graph,
            keywords,
            embeddings,
            cache,
            tracker,
            config,
        }
    }

    pub fn graph(&self) -> &Arc<dyn ConceptGraph> {
        &self.graph
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    fn graph_timeout(&self) -> Duration {
        self.config.graph_timeout()
    }

    /// Cache key input for a request; the target language is part of it.
    pub fn cache_key(&self, request: &RetrievalRequest) -> Result<String> {
        canonical_key_input(&json!({
            "request": request,
            "language": self.config.language,
        }))
        .map_err(|e| RagError::Internal(e.to_string()))
    }


    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        request.validate(&self.config)?;
        self.tracker.record_request();

        let span = info_span!(
            "retrieve",
            request_id = %Uuid::new_v4(),
            mode = %request.search_mode,
            k = request.k
        );
        self.retrieve_validated(request).instrument(span).await
    }

    async fn retrieve_validated(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        let key = self.cache_key(request)?;

        // Fail open: a cache error is a miss.
        if let Ok(Some(cached)) = self.cache.get::<RetrievalResult>(CachePrefix::Search, &key).await {
            self.tracker.record_cache_hit();
            debug!("Serving cached retrieval for '{}'", crate::safe_truncate(&request.query, 50));
            return Ok(cached);
        }
        self.tracker.record_cache_miss();

        let start = Instant::now();
        let result = timed("concept_retrieval", self.run_pipeline(request)).await?;
        self.tracker.record_search_time(start.elapsed());

        info!(
            "Retrieved {} concepts, {} relations, {} neighbors, {} paths",
            result.concepts.len(),
            result.relations.len(),
            result.neighbors.len(),
            result.paths.len()
        );

        if result.degraded {
            debug!("Degraded retrieval not cached");
        } else {
            let _ = self.cache.put(CachePrefix::Search, &key, &result).await;
        }
        Ok(result)
    }

    async fn run_pipeline(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        debug!("Strategy {}: {}", request.search_mode, request.search_mode.description());
        if request.search_mode.uses_keywords() {
            self.search_with_keywords(request).await
        } else {
            self.search_simple(request).await
        }
    }

    /// Label substring match only.
    async fn search_simple(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        let concepts = super::phases::bounded(
            "match_by_label",
            self.graph_timeout(),
            self.graph
                .match_by_label(Some(&self.config.language), request.query.trim(), request.k),
        )
        .await?;

        let mut result = RetrievalResult::empty(SearchMode::Simple, Vec::new());
        result.concepts = concepts;
        result.concepts.truncate(request.candidate_limit());
        Ok(result)
    }

    async fn search_with_keywords(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        let timeout = self.graph_timeout();
        let graph = self.graph.as_ref();
        let limit = request.candidate_limit();

        let extraction = self.keywords.extract(&request.query).await;
        info!(
            "Keywords ({}): {:?}",
            <&'static str>::from(extraction.source),
            extraction.keywords
        );

        let candidates = gather_candidates(
            graph,
            &self.config.language,
            &extraction.keywords,
            request.k,
            timeout,
        )
        .await?;

        let ranked = rerank_candidates(
            &self.embeddings,
            &request.query,
            candidates,
            limit,
            self.config.rerank_concurrency,
        )
        .await;

        let mut result = RetrievalResult::empty(request.search_mode, extraction.keywords);
        result.keyword_source = Some(extraction.source);
        result.reranked = ranked.reranked;
        result.degraded = ranked.degraded || extraction.source == KeywordSource::Fallback;
        result.concepts = ranked.concepts;
        result.concepts.truncate(limit);

        if result.concepts.is_empty() {
            return Ok(result);
        }

        let uris = result.concept_uris();
        let relations = collect_relations(graph, &uris, request.relation_limit(), timeout);
        let neighbors = async {
            if request.include_neighbors {
                expand_neighbors(graph, &uris, request.max_hops, request.neighbor_limit(), timeout).await
            } else {
                Ok(Vec::new())
            }
        };
        let paths = find_paths(graph, &result.concepts, timeout);

        let (relations, neighbors, paths) = futures::try_join!(relations, neighbors, paths)?;
        result.relations = relations;
        result.neighbors = neighbors;
        result.paths = paths;
        Ok(result)
    }
}
