//! Bounded TTL cache of finished answers.
//!
//! Keys are the SHA-256 of the trimmed, lowercased query and the mode.
//! Expiry is checked on read; when full, inserting a new key evicts the
//! oldest insertion.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use super::citation::Citation;
use super::classifier::Complexity;

/// A cached answer.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug)]
struct Entry {
    value: CachedResponse,
    inserted: Instant,
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    next_seq: u64,
}

/// Process-wide response cache, safe to share across runs.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<Inner>,
    max_entries: usize,
    ttl: Duration,
}

/// Mode component of a cache key: the confirmed mode or `auto`.
pub fn mode_key(mode: Option<Complexity>) -> &'static str {
    mode.map_or("auto", Complexity::as_str)
}

/// Cache key for a query and mode.
pub fn cache_key(query: &str, mode: &str) -> String {
    let raw = format!("{}:{mode}", query.trim().to_lowercase());
    let digest = Sha256::digest(raw.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl ResponseCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached answer when present and younger than the TTL.
    ///
    /// An expired entry is removed.
    pub fn get(&self, query: &str, mode: &str) -> Option<CachedResponse> {
        let key = cache_key(query, mode);
        let mut inner = self.lock();
        let expired = match inner.entries.get(&key) {
            None => return None,
            Some(entry) => entry.inserted.elapsed() >= self.ttl,
        };
        if expired {
            inner.entries.remove(&key);
            tracing::debug!(key = &key[..12], "cache entry expired");
            return None;
        }
        tracing::info!(key = &key[..12], "response cache hit");
        inner.entries.get(&key).map(|entry| entry.value.clone())
    }

    /// Store an answer, evicting the oldest entry if full and `key` is new.
    pub fn put(&self, query: &str, mode: &str, value: CachedResponse) {
        let key = cache_key(query, mode);
        let mut inner = self.lock();

        if inner.entries.len() >= self.max_entries && !inner.entries.contains_key(&key) {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                tracing::debug!("evicted oldest cache entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted: Instant::now(),
                seq,
            },
        );
        tracing::debug!(entries = inner.entries.len(), "response cached");
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
        tracing::info!("response cache cleared");
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
