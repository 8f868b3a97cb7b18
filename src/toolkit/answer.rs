

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::retrieval::{ConceptRetriever, RetrievalResult};
use crate::core::cache::{CachePrefix, ResultCache, canonical_key_input};
use crate::core::config::RagConfig;
use crate::core::error::{RagError, Result};
use crate::core::instrument::timed;
use crate::core::metrics::{PerformanceSnapshot, PerformanceTracker};
use crate::core::search_modes::RetrievalRequest;
use crate::db::HelixClient;
use crate::graph::helix::HelixConceptGraph;
use crate::graph::{ConceptGraph, GraphStatistics};
use crate::llm::embeddings::{EmbeddingClient, OllamaEmbedder};
use crate::llm::keywords::KeywordExtractor;
use crate::llm::providers::{GenerateOptions, LlmProvider, OllamaProvider};


const PROMPT_PREVIEW_CHARS: usize = 500;
const PROMPT_CONCEPTS: usize = 8;
const PROMPT_RELATIONS: usize = 10;
const PROMPT_NEIGHBORS: usize = 10;

const ANSWER_INSTRUCTION: &str = "You are an assistant that answers questions using a multilingual concept graph.\n\
Use the graph context below:\n\
1. Build on the concepts and relations that were found.\n\
2. When a connection path between concepts exists, explain it.\n\
3. Prefer relations with a higher weight.\n\
4. If the context is not enough, say so plainly.\n\
5. Answer in the language of the question, clearly and concisely.";


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub context: RetrievalResult,
    pub prompt_preview: String,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub graph: String,
    pub llm: String,
    pub cache_enabled: bool,
}

fn component_status<E: std::fmt::Display>(probe: std::result::Result<(), E>) -> (bool, String) {
    match probe {
        Ok(()) => (true, "healthy".to_string()),
        Err(e) => (false, format!("unhealthy: {}", e)),
    }
}

/// Renders the retrieved context and the question into the answer prompt.
pub fn build_context_prompt(question: &str, context: &RetrievalResult) -> String {
    let mut body = String::new();

    if !context.keywords.is_empty() {
        let _ = writeln!(body, "Query keywords: {}\n", context.keywords.join(", "));
    }

    if context.concepts.is_empty() {
        body.push_str("(no related concepts found)\n");
    } else {
        body.push_str("Concepts found:\n");
        for (i, concept) in context.concepts.iter().take(PROMPT_CONCEPTS).enumerate() {
            let _ = writeln!(body, "{}. {} ({})", i + 1, concept.label, concept.language);
        }
    }

    if !context.relations.is_empty() {
        body.push_str("\nRelations between concepts:\n");
        for relation in context.relations.iter().take(PROMPT_RELATIONS) {
            let _ = writeln!(
                body,
                "- {} --[{}]--> {} (weight: {:.2})",
                relation.start_label, relation.rel_type, relation.end_label, relation.weight
            );
        }
    }

    if !context.paths.is_empty() {
        body.push_str("\nConnection paths:\n");
        for path in &context.paths {
            let _ = writeln!(body, "- {}", path.render());
        }
    }

    if !context.neighbors.is_empty() {
        let labels: Vec<&str> = context
            .neighbors
            .iter()
            .take(PROMPT_NEIGHBORS)
            .map(|c| c.label.as_str())
            .collect();
        let _ = writeln!(body, "\nRelated concepts: {}", labels.join(", "));
    }

    format!(
        "{}\n\n[Question]\n{}\n\n[Graph context]\n{}\n[Answer]\n",
        ANSWER_INSTRUCTION, question, body
    )
}


/// Question answering and service-level operations over one retriever.
pub struct AnswerService {
    retriever: ConceptRetriever,
    llm: Arc<dyn LlmProvider>,
    options: GenerateOptions,
}

impl AnswerService {
    pub fn new(retriever: ConceptRetriever, llm: Arc<dyn LlmProvider>) -> Self {
        let config = retriever.config();
        let options = GenerateOptions::new(config.llm_temperature, config.llm_max_tokens);
        Self {
            retriever,
            llm,
            options,
        }
    }

    /// Wires HelixDB, Ollama and the result cache from configuration.
    pub async fn from_config(config: RagConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);

        let cache = Arc::new(ResultCache::from_config(&config).await);
        let helix = Arc::new(HelixClient::from_config(&config));
        let graph: Arc<dyn ConceptGraph> = Arc::new(HelixConceptGraph::new(helix));

        let keyword_llm: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(
            &config.ollama_url,
            &config.llm_model,
            Duration::from_secs(config.keyword_timeout_secs),
        )?);
        let answer_llm: Arc<dyn LlmProvider> = Arc::new(OllamaProvider::new(
            &config.ollama_url,
            &config.llm_model,
            Duration::from_secs(config.llm_timeout_secs),
        )?);
        let embedder = OllamaEmbedder::new(
            &config.ollama_url,
            &config.embedding_model,
            Duration::from_secs(config.embedding_timeout_secs),
        )
        .map_err(|e| RagError::Config(format!("embedding client: {}", e)))?;

        let retriever = ConceptRetriever::new(
            graph,
            KeywordExtractor::new(keyword_llm),
            EmbeddingClient::new(Arc::new(embedder), cache.clone()),
            cache,
            Arc::new(PerformanceTracker::new()),
            config,
        );

        info!("AnswerService ready (graph {})", retriever.config().graph_base_url());
        Ok(Self::new(retriever, answer_llm))
    }

    pub fn retriever(&self) -> &ConceptRetriever {
        &self.retriever
    }

    pub fn config(&self) -> &RagConfig {
        self.retriever.config()
    }

    fn cache(&self) -> &ResultCache {
        self.retriever.cache()
    }

    fn tracker(&self) -> &PerformanceTracker {
        self.retriever.tracker()
    }


    pub async fn search(&self, request: &RetrievalRequest) -> Result<RetrievalResult> {
        self.retriever.retrieve(request).await
    }

    /// Retrieves context for the question and asks the LLM to answer from it.
    pub async fn ask(&self, request: &RetrievalRequest) -> Result<ChatAnswer> {
        let context = self.retriever.retrieve(request).await?;
        let prompt = build_context_prompt(&request.query, &context);
        let prompt_preview = crate::safe_truncate_ellipsis(&prompt, PROMPT_PREVIEW_CHARS);

        let key = canonical_key_input(&json!({
            "model": self.llm.model_name(),
            "prompt": prompt,
            "options": self.options,
        }))
        .map_err(|e| RagError::Internal(e.to_string()))?;

        if let Ok(Some(answer)) = self.cache().get::<String>(CachePrefix::LlmResponse, &key).await {
            self.tracker().record_cache_hit();
            return Ok(ChatAnswer {
                answer,
                context,
                prompt_preview,
            });
        }
        self.tracker().record_cache_miss();

        let start = Instant::now();
        let answer = timed("answer_generation", self.llm.generate(&prompt, &self.options)).await?;
        self.tracker().record_llm_time(start.elapsed());

        let _ = self.cache().put(CachePrefix::LlmResponse, &key, &answer).await;
        Ok(ChatAnswer {
            answer,
            context,
            prompt_preview,
        })
    }


    pub async fn graph_stats(&self) -> Result<GraphStatistics> {
        const KEY: &str = "graph";
        if let Ok(Some(stats)) = self.cache().get::<GraphStatistics>(CachePrefix::Stats, KEY).await {
            return Ok(stats);
        }

        let timeout = self.config().graph_timeout();
        let stats = match tokio::time::timeout(timeout, self.retriever.graph().statistics()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RagError::Timeout {
                    operation: "statistics".to_string(),
                    secs: timeout.as_secs(),
                });
            }
        };

        let _ = self.cache().put(CachePrefix::Stats, KEY, &stats).await;
        Ok(stats)
    }

    /// Probes the graph store and the LLM endpoint; never fails.
    pub async fn health(&self) -> HealthReport {
        let (graph_probe, llm_probe) = tokio::join!(self.retriever.graph().health(), self.llm.health());
        let (graph_ok, graph) = component_status(graph_probe);
        let (llm_ok, llm) = component_status(llm_probe);

        let status = if graph_ok && llm_ok {
            HealthStatus::Ok
        } else {
            warn!("Health degraded: graph={}, llm={}", graph, llm);
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            graph,
            llm,
            cache_enabled: self.cache().is_enabled(),
        }
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.tracker().snapshot()
    }

    /// Clears one prefix, or every prefix when `prefix` is `None`.
    pub async fn clear_cache(&self, prefix: Option<CachePrefix>) -> Result<usize> {
        let prefixes: Vec<CachePrefix> = match prefix {
            Some(p) => vec![p],
            None => CachePrefix::ALL.to_vec(),
        };

        let mut removed = 0;
        for prefix in prefixes {
            removed += self
                .cache()
                .clear_prefix(prefix)
                .await
                .map_err(|e| RagError::Internal(format!("cache clear failed: {}", e)))?;
        }
        Ok(removed)
    }
}
