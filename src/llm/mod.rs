

pub mod embeddings;
pub mod keywords;
pub mod providers;

pub use embeddings::{Embedder, EmbeddingClient, EmbeddingError, OllamaEmbedder, cosine_similarity};
pub use keywords::{KeywordExtraction, KeywordExtractor, KeywordSource};
pub use providers::{GenerateOptions, LlmProvider, LlmProviderError, OllamaProvider};
