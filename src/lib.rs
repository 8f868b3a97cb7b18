

pub mod core;
pub mod db;
pub mod graph;
pub mod llm;
pub mod mcp;
pub mod toolkit;
pub mod utils;

pub use utils::{safe_truncate, safe_truncate_ellipsis};


pub use core::config::RagConfig;
pub use core::error::{RagError, Result};
pub use core::search_modes::{RetrievalRequest, SearchMode};
pub use db::{HelixClient, HelixClientError};
pub use graph::{Concept, ConceptGraph, ConceptPath, Relation};
pub use llm::embeddings::EmbeddingClient;
pub use toolkit::answer::{AnswerService, ChatAnswer};
pub use toolkit::retrieval::{ConceptRetriever, RetrievalResult};


pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";


pub const DEFAULT_LLM_MODEL: &str = "mistral";


pub const DEFAULT_HELIX_PORT: u16 = 6969;


pub const DEFAULT_LANGUAGE: &str = "ko";


pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;


pub const MAX_KEYWORDS: usize = 5;


pub const SHORTEST_PATH_MAX_HOPS: u32 = 3;
