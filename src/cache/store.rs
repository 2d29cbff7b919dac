//! Thread-safe byte cache used by each group.
//!
//! One mutex guards the LRU; every operation is a single critical section.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::lru::LruCache;
use super::view::ByteView;
use crate::domain::ports::EvictionObserver;

/// Shared, internally synchronized LRU of [`ByteView`]s
pub struct ByteCache {
    lru: Mutex<LruCache<ByteView>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ByteCache {
    /// Create a cache with a byte budget (0 = unbounded)
    pub fn new(max_bytes: u64) -> Self {
        Self::from_lru(LruCache::new(max_bytes))
    }

    /// Create a cache that reports evictions to `observer`.
    ///
    /// The observer runs while the cache lock is held and must not call back
    /// into the same cache.
    pub fn with_observer(max_bytes: u64, observer: Arc<dyn EvictionObserver<ByteView>>) -> Self {
        Self::from_lru(LruCache::with_observer(max_bytes, observer))
    }

    fn from_lru(lru: LruCache<ByteView>) -> Self {
        Self {
            lru: Mutex::new(lru),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a key, refreshing its recency on a hit
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let found = self.lru.lock().get(key).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Insert or replace a key
    pub fn add(&self, key: &str, value: ByteView) {
        self.lru.lock().add(key, value);
    }

    /// Remove a key
    pub fn remove(&self, key: &str) -> Option<ByteView> {
        self.lru.lock().remove(key)
    }

    /// Check if a key is held, without touching recency
    pub fn contains(&self, key: &str) -> bool {
        self.lru.lock().contains(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lru.lock().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.lru.lock().is_empty()
    }

    /// Bytes currently held
    pub fn used_bytes(&self) -> u64 {
        self.lru.lock().used_bytes()
    }

    /// Drop all entries
    pub fn clear(&self) {
        self.lru.lock().clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let lru = self.lru.lock();
        CacheStats {
            bytes: lru.used_bytes(),
            max_bytes: lru.max_bytes(),
            entries: lru.len() as u64,
            evictions: lru.evictions(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ByteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCache")
            .field("lru", &*self.lru.lock())
            .finish()
    }
}

/// Byte cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Bytes held (keys + values)
    pub bytes: u64,
    /// Byte budget (0 = unbounded)
    pub max_bytes: u64,
    /// Number of entries
    pub entries: u64,
    /// Entries evicted to respect the budget
    pub evictions: u64,
    /// Lookup hits
    pub hits: u64,
    /// Lookup misses
    pub misses: u64,
}

// =============================================================================
// Tests
// =============================================================================
