

pub mod answer;
pub mod retrieval;


pub use answer::{AnswerService, ChatAnswer, HealthReport, HealthStatus, build_context_prompt};
pub use retrieval::{ConceptRetriever, RetrievalResult};
