

pub mod cache;
pub mod config;
pub mod error;
pub mod instrument;
pub mod metrics;
pub mod search_modes;

pub use cache::{CacheBackend, CacheError, CachePrefix, CacheTtl, MemoryBackend, ResultCache};
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use instrument::{timed, timed_sync};
pub use metrics::{PerformanceSnapshot, PerformanceTracker};
pub use search_modes::{RetrievalRequest, SearchMode};
