

use rmcp::{
    handler::server::{
        router::tool::ToolRouter,
        router::prompt::PromptRouter,
        wrapper::Parameters,
    },
    model::*,
    tool, tool_handler, tool_router,
    prompt, prompt_handler, prompt_router,
    transport::stdio,
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use rmcp::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::core::cache::CachePrefix;
use crate::core::config::RagConfig;
use crate::core::error::RagError;
use crate::core::instrument::timed_sync;
use crate::core::search_modes::{RetrievalRequest, SearchMode};
use crate::toolkit::answer::AnswerService;


#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct SearchConceptsParams {
    #[schemars(description = "Natural-language question or phrase")]
    pub query: String,
    #[schemars(description = "Concept budget (default: 8). Up to 2k concepts are returned")]
    pub k: Option<usize>,
    #[schemars(description = "Search mode: 'simple' (label match), 'embedding', 'hybrid' (default)")]
    pub search_mode: Option<String>,
    #[schemars(description = "Expand multi-hop neighbors (default: true)")]
    pub include_neighbors: Option<bool>,
    #[schemars(description = "Neighbor traversal depth (default: 2)")]
    pub max_hops: Option<u32>,
}

#[derive(Debug, Deserialize, rmcp::schemars::JsonSchema)]
pub struct ClearCacheParams {
    #[schemars(description = "Cache prefix: 'search', 'llm_response', 'embedding', 'stats'. Omit to clear all")]
    pub prefix: Option<String>,
}


#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ConceptQuestionArgs {
    #[schemars(description = "Question to explore in the concept graph")]
    pub question: String,
}


#[derive(Clone)]
pub struct ConceptRagMcpServer {
    service: Arc<AnswerService>,
    tool_router: ToolRouter<Self>,
    prompt_router: PromptRouter<Self>,
}

impl ConceptRagMcpServer {

    pub fn new(service: AnswerService) -> Self {
        Self {
            service: Arc::new(service),
            tool_router: Self::tool_router(),
            prompt_router: Self::prompt_router(),
        }
    }


    fn convert_error(err: RagError) -> McpError {
        match err {
            RagError::InvalidInput(msg) => McpError::invalid_params(msg, None),
            RagError::Config(msg) => McpError::invalid_params(msg, None),
            other => McpError::internal_error(other.to_string(), None),
        }
    }


    fn result_to_json<T: Serialize>(result: T) -> Result<String, McpError> {
        serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    /// Fills unset fields from configured defaults.
    fn build_request(config: &RagConfig, params: SearchConceptsParams) -> Result<RetrievalRequest, McpError> {
        let mode = match params.search_mode.as_deref() {
            Some(raw) => SearchMode::parse(raw).map_err(Self::convert_error)?,
            None => SearchMode::default(),
        };

        Ok(RetrievalRequest::new(params.query)
            .with_k(params.k.unwrap_or(config.default_k))
            .with_mode(mode)
            .with_neighbors(params.include_neighbors.unwrap_or(true))
            .with_max_hops(params.max_hops.unwrap_or(config.default_max_hops)))
    }
}

#[tool_router]
impl ConceptRagMcpServer {

    #[tool(description = "Retrieve concepts, relations, multi-hop neighbors and connection paths for a question. Returns: {concepts, relations, neighbors, paths, keywords, search_mode}")]
    async fn search_concepts(
        &self,
        Parameters(params): Parameters<SearchConceptsParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::build_request(self.service.config(), params)?;
        info!(
            "Searching: '{}' [mode={}, k={}]",
            crate::safe_truncate(&request.query, 50),
            request.search_mode,
            request.k
        );

        let result = self.service.search(&request).await.map_err(Self::convert_error)?;
        info!("Found {} concepts", result.concepts.len());

        let json = Self::result_to_json(&result)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Answer a question from concept-graph context with the LLM. Returns: {answer, context, prompt_preview}")]
    async fn ask_question(
        &self,
        Parameters(params): Parameters<SearchConceptsParams>,
    ) -> Result<CallToolResult, McpError> {
        let request = Self::build_request(self.service.config(), params)?;
        info!("Answering: '{}'", crate::safe_truncate(&request.query, 50));

        let answer = self.service.ask(&request).await.map_err(Self::convert_error)?;

        let json = Self::result_to_json(&answer)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Concept graph statistics. Returns: {total_concepts, total_relations, concepts_by_language}")]
    async fn graph_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.service.graph_stats().await.map_err(Self::convert_error)?;
        let json = Self::result_to_json(&stats)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Probe the graph store and LLM endpoint. Returns: {status: ok|degraded, graph, llm, cache_enabled}")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let report = self.service.health().await;
        let json = Self::result_to_json(&report)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Request, cache and latency counters. Returns: {total_requests, cache_hit_rate, avg_search_time_ms, p95_search_time_ms, ...}")]
    async fn performance_stats(&self) -> Result<CallToolResult, McpError> {
        let snapshot = self.service.performance();
        let json = Self::result_to_json(&snapshot)?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }


    #[tool(description = "Drop cached entries for one prefix or all prefixes. Returns: {removed}")]
    async fn clear_cache(
        &self,
        Parameters(params): Parameters<ClearCacheParams>,
    ) -> Result<CallToolResult, McpError> {
        let prefix = match params.prefix.as_deref() {
            Some(raw) => Some(CachePrefix::from_str(raw).map_err(|_| {
                McpError::invalid_params(format!("unknown cache prefix '{}'", raw), None)
            })?),
            None => None,
        };

        let removed = self
            .service
            .clear_cache(prefix)
            .await
            .map_err(Self::convert_error)?;
        if removed == 0 {
            info!("Cache clear removed nothing");
        }

        let json = Self::result_to_json(json!({ "removed": removed }))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}


#[prompt_router]
impl ConceptRagMcpServer {

    #[prompt(
        name = "concept_question",
        description = "Prompt that explores a question through the concept graph before answering"
    )]
    async fn concept_question(
        &self,
        Parameters(args): Parameters<ConceptQuestionArgs>,
    ) -> Result<GetPromptResult, McpError> {
        let messages = vec![
            PromptMessage::new_text(
                PromptMessageRole::User,
                format!(
                    "Question: {}

Use search_concepts to gather related concepts first.
Then answer with:
1. The key concepts involved
2. How they are related (cite relation types and weights)
3. Any connection path between the leading concepts
4. What the graph does not cover",
                    args.question
                ),
            ),
        ];

        Ok(GetPromptResult {
            description: Some(format!(
                "Concept exploration for '{}'",
                crate::safe_truncate(&args.question, 40)
            )),
            messages,
        })
    }
}


#[tool_handler]
#[prompt_handler]
impl ServerHandler for ConceptRagMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_prompts()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "conceptrag".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Concept graph retrieval: keyword extraction, graph traversal and embedding \
                 re-ranking over a multilingual concept graph. Use search_concepts for context, \
                 ask_question for a grounded answer."
                    .to_string(),
            ),
        }
    }


    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: vec![
                RawResource::new("config://conceptrag", "conceptrag-config".to_string())
                    .no_annotation(),
            ],
            next_cursor: None,
        })
    }

    async fn read_resource(
        &self,
        ReadResourceRequestParam { uri }: ReadResourceRequestParam,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        match uri.as_str() {
            "config://conceptrag" => {
                let config = self.service.config();

                let content = serde_json::to_string_pretty(&json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "graph": {
                        "url": config.graph_base_url(),
                        "timeout_secs": config.graph_timeout_secs,
                    },
                    "llm": {
                        "url": config.ollama_url,
                        "model": config.llm_model,
                        "embedding_model": config.embedding_model,
                    },
                    "retrieval": {
                        "language": config.language,
                        "default_k": config.default_k,
                        "max_k": config.max_k,
                        "default_max_hops": config.default_max_hops,
                        "max_hops_limit": config.max_hops_limit,
                    },
                    "cache": {
                        "enabled": config.cache_enabled,
                        "ttl_secs": {
                            "search": config.ttl_search_secs,
                            "llm_response": config.ttl_llm_response_secs,
                            "embedding": config.ttl_embedding_secs,
                            "stats": config.ttl_stats_secs,
                        },
                    },
                    "tools": [
                        "search_concepts",
                        "ask_question",
                        "graph_stats",
                        "health_check",
                        "performance_stats",
                        "clear_cache",
                    ],
                })).map_err(|e| McpError::internal_error(e.to_string(), None))?;

                Ok(ReadResourceResult {
                    contents: vec![ResourceContents::text(content, uri)],
                })
            }
            _ => Err(McpError::resource_not_found(
                format!("Unknown resource: {}", uri),
                Some(json!({ "uri": uri })),
            )),
        }
    }
}


pub async fn run_server() -> anyhow::Result<()> {
    info!("Initializing conceptrag MCP server...");

    let config = timed_sync("config_load", RagConfig::load)?;
    let service = AnswerService::from_config(config).await?;

    let config = service.config();
    info!("conceptrag MCP server ready");
    info!("   Graph: {}", config.graph_base_url());
    info!("   LLM: {} @ {}", config.llm_model, config.ollama_url);
    info!("   Language: {}", config.language);

    let server = ConceptRagMcpServer::new(service);
    let running = server.serve(stdio()).await?;
    running.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> SearchConceptsParams {
        SearchConceptsParams {
            query: query.to_string(),
            k: None,
            search_mode: None,
            include_neighbors: None,
            max_hops: None,
        }
    }

    #[test]
    fn test_request_defaults_from_config() {
        let config = RagConfig::default();
        let request = ConceptRagMcpServer::build_request(&config, params("사랑")).unwrap();
        assert_eq!(request.k, config.default_k);
        assert_eq!(request.max_hops, config.default_max_hops);
        assert_eq!(request.search_mode, SearchMode::Hybrid);
        assert!(request.include_neighbors);
    }

    #[test]
    fn test_request_mode_parsed() {
        let config = RagConfig::default();
        let mut p = params("사랑");
        p.search_mode = Some("Simple".to_string());
        p.k = Some(3);
        let request = ConceptRagMcpServer::build_request(&config, p).unwrap();
        assert_eq!(request.search_mode, SearchMode::Simple);
        assert_eq!(request.k, 3);

        let mut bad = params("사랑");
        bad.search_mode = Some("fuzzy".to_string());
        assert!(ConceptRagMcpServer::build_request(&config, bad).is_err());
    }

    #[test]
    fn test_cache_prefix_names() {
        assert_eq!(CachePrefix::from_str("llm_response").unwrap(), CachePrefix::LlmResponse);
        assert!(CachePrefix::from_str("bogus").is_err());
    }
}
