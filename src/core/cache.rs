//! Fail-open result cache.
//!
//! Every operation returns a `Result` so call sites decide, visibly, to ignore
//! cache failures. A cache whose backend could not be reached at startup stays
//! disabled for the lifetime of the process.

use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::{EnumString, IntoStaticStr};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::config::RagConfig;


#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache backend error: {0}")]
    Backend(String),
}


/// Key/value store with per-key expiry and prefix enumeration.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn ping(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;
}


struct StoredValue {
    payload: String,
    expires_at: Instant,
}


pub struct MemoryBackend {
    entries: Mutex<LruCache<String, StoredValue>>,
}

impl MemoryBackend {

    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(stored) if stored.expires_at > Instant::now() => {
                return Ok(Some(stored.payload.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        entries.put(
            key.to_string(),
            StoredValue {
                payload: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().pop(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .iter()
            .filter(|(key, stored)| key.starts_with(prefix) && stored.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect())
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CachePrefix {
    Search,
    LlmResponse,
    Embedding,
    Stats,
}

impl CachePrefix {
    pub const ALL: [CachePrefix; 4] = [Self::Search, Self::LlmResponse, Self::Embedding, Self::Stats];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}


/// Per-prefix time to live.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtl {
    pub search: Duration,
    pub llm_response: Duration,
    pub embedding: Duration,
    pub stats: Duration,
}

impl CacheTtl {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            search: Duration::from_secs(config.ttl_search_secs),
            llm_response: Duration::from_secs(config.ttl_llm_response_secs),
            embedding: Duration::from_secs(config.ttl_embedding_secs),
            stats: Duration::from_secs(config.ttl_stats_secs),
        }
    }

    #[must_use]
    pub fn for_prefix(&self, prefix: CachePrefix) -> Duration {
        match prefix {
            CachePrefix::Search => self.search,
            CachePrefix::LlmResponse => self.llm_response,
            CachePrefix::Embedding => self.embedding,
            CachePrefix::Stats => self.stats,
        }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}


/// Stable text for structured key input. Object keys come out sorted, so field
/// order of the caller's value does not change the key.
pub fn canonical_key_input<T: Serialize + ?Sized>(input: &T) -> Result<String, CacheError> {
    let value = serde_json::to_value(input)?;
    Ok(serde_json::to_string(&value)?)
}


pub fn make_key(prefix: &str, key_input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key_input.as_bytes());
    format!("{}:{:x}", prefix, hasher.finalize())
}


pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    ttl: CacheTtl,
}

impl ResultCache {
    /// Pings the backend up to `retries` times. An unreachable backend yields a
    /// disabled cache instead of an error.
    pub async fn connect(backend: Arc<dyn CacheBackend>, retries: u32, ttl: CacheTtl) -> Self {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            match backend.ping().await {
                Ok(()) => {
                    info!("Result cache connected (attempt {})", attempt);
                    return Self {
                        backend: Some(backend),
                        ttl,
                    };
                }
                Err(e) => {
                    warn!("Cache ping failed (attempt {}/{}): {}", attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
                    }
                }
            }
        }
        warn!("Cache backend unreachable, caching disabled");
        Self::disabled()
    }


    pub fn disabled() -> Self {
        Self {
            backend: None,
            ttl: CacheTtl::default(),
        }
    }


    pub async fn from_config(config: &RagConfig) -> Self {
        if !config.cache_enabled {
            info!("Result cache disabled by configuration");
            return Self::disabled();
        }
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new(config.cache_capacity));
        Self::connect(backend, config.cache_connect_retries, CacheTtl::from_config(config)).await
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }


    pub async fn get<T: DeserializeOwned>(
        &self,
        prefix: CachePrefix,
        key_input: &str,
    ) -> Result<Option<T>, CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(None);
        };
        let key = make_key(prefix.as_str(), key_input);

        let raw = backend.get(&key).await.inspect_err(|e| {
            warn!("Cache get failed for {}: {}", prefix.as_str(), e);
        })?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                debug!("Cache HIT {}", key);
                Ok(Some(value))
            }
            Err(e) => {
                warn!("Dropping undecodable cache entry {}: {}", key, e);
                let _ = backend.delete(&key).await;
                Err(CacheError::Serialization(e))
            }
        }
    }

    /// Stores under the prefix's policy TTL.
    pub async fn put<T: Serialize + ?Sized>(
        &self,
        prefix: CachePrefix,
        key_input: &str,
        value: &T,
    ) -> Result<(), CacheError> {
        let ttl = self.ttl.for_prefix(prefix);
        self.set(prefix, key_input, value, ttl).await
    }


    pub async fn set<T: Serialize + ?Sized>(
        &self,
        prefix: CachePrefix,
        key_input: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let payload = serde_json::to_string(value).inspect_err(|e| {
            warn!("Cache serialization failed for {}: {}", prefix.as_str(), e);
        })?;
        let key = make_key(prefix.as_str(), key_input);
        backend.set_ex(&key, payload, ttl).await.inspect_err(|e| {
            warn!("Cache set failed for {}: {}", prefix.as_str(), e);
        })
    }


    pub async fn delete(&self, prefix: CachePrefix, key_input: &str) -> Result<(), CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let key = make_key(prefix.as_str(), key_input);
        backend.delete(&key).await.inspect_err(|e| {
            warn!("Cache delete failed for {}: {}", prefix.as_str(), e);
        })
    }

    /// Deletes every key under `prefix` one by one. Not atomic.
    pub async fn clear_prefix(&self, prefix: CachePrefix) -> Result<usize, CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(0);
        };
        let pattern = format!("{}:", prefix.as_str());
        let keys = backend.scan_prefix(&pattern).await.inspect_err(|e| {
            warn!("Cache scan failed for {}: {}", prefix.as_str(), e);
        })?;

        let mut removed = 0;
        for key in keys {
            backend.delete(&key).await.inspect_err(|e| {
                warn!("Cache clear failed at {}: {}", key, e);
            })?;
            removed += 1;
        }
        info!("Cleared {} cache entries under {}", removed, prefix.as_str());
        Ok(removed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    /// Backend that fails every call.
    pub(crate) struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("read failed".to_string()))
        }
        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("write failed".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("delete failed".to_string()))
        }
        async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Backend("scan failed".to_string()))
        }
    }

    /// Reachable at startup, failing afterwards.
    struct FlakyBackend;

    #[async_trait]
    impl CacheBackend for FlakyBackend {
        async fn ping(&self) -> Result<(), CacheError> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Backend("timeout".to_string()))
        }
        async fn set_ex(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("timeout".to_string()))
        }
        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("timeout".to_string()))
        }
        async fn scan_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
            Err(CacheError::Backend("timeout".to_string()))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        labels: Vec<String>,
        score: f64,
    }

    async fn memory_cache() -> ResultCache {
        ResultCache::connect(Arc::new(MemoryBackend::new(16)), 1, CacheTtl::default()).await
    }

    #[test]
    fn test_canonical_key_ignores_field_order() {
        let a = json!({"query": "사랑", "k": 8, "mode": "hybrid"});
        let b = json!({"mode": "hybrid", "k": 8, "query": "사랑"});
        assert_eq!(canonical_key_input(&a).unwrap(), canonical_key_input(&b).unwrap());
    }

    #[test]
    fn test_make_key_is_prefixed_and_stable() {
        let key = make_key("search", "abc");
        assert!(key.starts_with("search:"));
        assert_eq!(key.len(), "search:".len() + 64);
        assert_eq!(key, make_key("search", "abc"));
        assert_ne!(key, make_key("stats", "abc"));
    }

    #[test]
    fn test_prefix_names() {
        assert_eq!(CachePrefix::Search.as_str(), "search");
        assert_eq!(CachePrefix::LlmResponse.as_str(), "llm_response");
        assert_eq!(CachePrefix::Embedding.as_str(), "embedding");
    }

    #[test]
    fn test_ttl_policy_from_config() {
        let config = RagConfig {
            ttl_stats_secs: 60,
            ..Default::default()
        };
        let ttl = CacheTtl::from_config(&config);
        assert_eq!(ttl.for_prefix(CachePrefix::Stats), Duration::from_secs(60));
        assert_eq!(ttl.for_prefix(CachePrefix::LlmResponse), Duration::from_secs(7200));
        assert_eq!(ttl.for_prefix(CachePrefix::Embedding), Duration::from_secs(86400));

        let disabled = tokio_test::block_on(ResultCache::from_config(&RagConfig {
            cache_enabled: false,
            ..Default::default()
        }));
        assert!(!disabled.is_enabled());
    }

    #[tokio::test]
    async fn test_set_then_get_roundtrip() {
        let cache = memory_cache().await;
        let value = Payload {
            labels: vec!["사랑".to_string(), "감정".to_string()],
            score: 0.75,
        };
        cache
            .set(CachePrefix::Search, "q1", &value, Duration::from_secs(60))
            .await
            .unwrap();
        let cached: Option<Payload> = cache.get(CachePrefix::Search, "q1").await.unwrap();
        assert_eq!(cached, Some(value));
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let cache = memory_cache().await;
        cache
            .set(CachePrefix::Stats, "s", &42u32, Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        let cached: Option<u32> = cache.get(CachePrefix::Stats, "s").await.unwrap();
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_delete_and_clear_prefix() {
        let cache = memory_cache().await;
        cache.put(CachePrefix::Search, "a", &1u32).await.unwrap();
        cache.put(CachePrefix::Search, "b", &2u32).await.unwrap();
        cache.put(CachePrefix::Embedding, "a", &3u32).await.unwrap();

        cache.delete(CachePrefix::Search, "a").await.unwrap();
        assert_eq!(cache.get::<u32>(CachePrefix::Search, "a").await.unwrap(), None);

        let removed = cache.clear_prefix(CachePrefix::Search).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.get::<u32>(CachePrefix::Search, "b").await.unwrap(), None);
        assert_eq!(cache.get::<u32>(CachePrefix::Embedding, "a").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let cache = memory_cache().await;
        cache.put(CachePrefix::Search, "x", &"plain text").await.unwrap();
        let result = cache.get::<Payload>(CachePrefix::Search, "x").await;
        assert!(matches!(result, Err(CacheError::Serialization(_))));
        assert_eq!(cache.get::<String>(CachePrefix::Search, "x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreachable_backend_disables_cache() {
        let cache = ResultCache::connect(Arc::new(BrokenBackend), 2, CacheTtl::default()).await;
        assert!(!cache.is_enabled());
        cache.put(CachePrefix::Search, "q", &1u32).await.unwrap();
        assert_eq!(cache.get::<u32>(CachePrefix::Search, "q").await.unwrap(), None);
        assert_eq!(cache.clear_prefix(CachePrefix::Search).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_runtime_failures_surface_as_errors() {
        let cache = ResultCache::connect(Arc::new(FlakyBackend), 1, CacheTtl::default()).await;
        assert!(cache.is_enabled());
        assert!(cache.get::<u32>(CachePrefix::Search, "q").await.is_err());
        assert!(cache.put(CachePrefix::Search, "q", &1u32).await.is_err());
        assert!(cache.clear_prefix(CachePrefix::Search).await.is_err());
    }

    #[tokio::test]
    async fn test_lru_capacity_bounds_backend() {
        let backend = MemoryBackend::new(2);
        for key in ["a", "b", "c"] {
            backend
                .set_ex(key, key.to_string(), Duration::from_secs(60))
                .await
                .unwrap();
        }
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get("a").await.unwrap(), None);
        assert_eq!(backend.get("c").await.unwrap(), Some("c".to_string()));
    }
}
