//! In-memory source of truth.
//!
//! Backs the demo group of the node binary and doubles as a test stub:
//! it counts how often each path of the loader is taken.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::ports::SourceLoader;
use crate::error::{Error, Result};

/// [`SourceLoader`] serving values from a concurrent map
#[derive(Default)]
pub struct InMemorySource {
    data: DashMap<String, Bytes>,
    loads: AtomicU64,
    misses: AtomicU64,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a value
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.data.remove(key).map(|(_, v)| v)
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the source holds nothing
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Successful loads served
    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    /// Loads for keys not present
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl<K, V> FromIterator<(K, V)> for InMemorySource
where
    K: Into<String>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let source = Self::new();
        for (key, value) in iter {
            source.insert(key, value);
        }
        source
    }
}

#[async_trait]
impl SourceLoader for InMemorySource {
    async fn load(&self, key: &str) -> Result<Bytes> {
        debug!(key, "searching source");
        match self.data.get(key) {
            Some(value) => {
                self.loads.fetch_add(1, Ordering::Relaxed);
                Ok(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Err(Error::not_found(key))
            }
        }
    }
}

impl std::fmt::Debug for InMemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySource")
            .field("keys", &self.data.len())
            .field("loads", &self.loads())
            .field("misses", &self.misses())
            .finish()
    }
}
