//! Retrieval Orchestrator: query in, bounded and ranked graph context out.

pub mod models;
pub mod phases;
pub mod retriever;


pub use models::{CandidateSet, RetrievalResult};
pub use retriever::ConceptRetriever;
