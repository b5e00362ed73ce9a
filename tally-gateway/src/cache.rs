//! TTL + capacity-bounded response cache
//!
//! LRU store keyed by a canonicalized request signature. Both bounds apply
//! independently: whichever triggers first wins. Shared across all in-flight
//! tasks; each call mutates state atomically.

use lru::LruCache;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tally_core::config::CacheConfig;
use tally_core::constants::CACHE_KEY_DIGEST_LEN;

/// Cache occupancy and hit-rate counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    stored_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    store: LruCache<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// GET-response cache with uniform TTL and LRU capacity eviction.
#[derive(Debug)]
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with the given bounds.
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).expect("capacity is at least 1");
        Self {
            inner: Mutex::new(CacheInner {
                store: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            ttl: config.ttl,
        }
    }

    /// Stable cache key for a request. The path is kept in clear so
    /// substring invalidation can target a resource; the parameter set is
    /// canonicalized (sorted) and digested so logically identical requests
    /// collide regardless of parameter order.
    pub fn request_key(path: &str, params: &[(String, String)]) -> String {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let canonical = serde_json::to_string(&sorted).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(canonical.as_bytes());
        let digest = hex::encode(hasher.finalize());

        format!("{}#{}", path, &digest[..CACHE_KEY_DIGEST_LEN])
    }

    /// Fetch a live entry, promoting its recency. Expired entries are
    /// removed and counted as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut inner = self.lock();
        match inner.store.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                let data = entry.data.clone();
                inner.hits += 1;
                Some(data)
            }
            Some(_) => {
                inner.store.pop(key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Store a response. Evicts the least-recently-used entry on overflow.
    pub fn set(&self, key: String, data: Value) {
        let mut inner = self.lock();
        let replacing = inner.store.contains(&key);
        let at_capacity = inner.store.len() == inner.store.cap().get();
        if at_capacity && !replacing {
            inner.evictions += 1;
        }
        inner.store.put(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }

    /// Whether a live entry exists. Does not promote recency or count stats.
    pub fn has(&self, key: &str) -> bool {
        let inner = self.lock();
        inner
            .store
            .peek(key)
            .is_some_and(|entry| entry.stored_at.elapsed() < self.ttl)
    }

    /// Age of a live entry in whole seconds.
    pub fn get_age(&self, key: &str) -> Option<u64> {
        let inner = self.lock();
        inner.store.peek(key).and_then(|entry| {
            let age = entry.stored_at.elapsed();
            (age < self.ttl).then(|| age.as_secs())
        })
    }

    /// Remove every entry whose key contains the given substring.
    /// Returns the number of entries removed.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let mut inner = self.lock();
        let doomed: Vec<String> = inner
            .store
            .iter()
            .filter(|(key, _)| key.contains(pattern))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            inner.store.pop(key);
        }
        if !doomed.is_empty() {
            tracing::debug!(pattern, count = doomed.len(), "Invalidated cached responses");
        }
        doomed.len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().store.clear();
    }

    /// Current occupancy and counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.store.len(),
            capacity: inner.store.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// TESTS
// =============================================================================


// =============================================================================
// PROPERTY-BASED TESTS
// =============================================================================
