//! In-memory cache for web search results.
//!
//! Caches parsed DuckDuckGo results keyed by the (normalised query,
//! result limit) pair. Uses [`moka`] for async-friendly caching with a
//! TTL and automatic eviction.

use std::sync::OnceLock;
use std::time::Duration;

use moka::future::Cache;

use crate::types::WebResult;

/// Maximum number of cached result sets.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Global process-wide web result cache.
///
/// Lazily initialised on first access. The TTL is fixed by the first
/// caller and cannot change afterwards.
static CACHE: OnceLock<Cache<CacheKey, Vec<WebResult>>> = OnceLock::new();

/// Cache key: normalised query plus the requested result limit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    limit: usize,
}

impl CacheKey {
    /// Build a key. The query is trimmed and lowercased.
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            limit,
        }
    }
}

fn get_or_init_cache(ttl_seconds: u64) -> &'static Cache<CacheKey, Vec<WebResult>> {
    CACHE.get_or_init(|| {
        Cache::builder()
            .max_capacity(MAX_CACHE_ENTRIES)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build()
    })
}

/// Look up cached results. A TTL of 0 disables the cache.
pub async fn get(key: &CacheKey, ttl_seconds: u64) -> Option<Vec<WebResult>> {
    if ttl_seconds == 0 {
        return None;
    }
    get_or_init_cache(ttl_seconds).get(key).await
}

/// Insert results. A TTL of 0 disables the cache.
pub async fn insert(key: CacheKey, results: Vec<WebResult>, ttl_seconds: u64) {
    if ttl_seconds == 0 {
        return;
    }
    get_or_init_cache(ttl_seconds).insert(key, results).await;
}
