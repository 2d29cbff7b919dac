//! Cache groups
//!
//! A [`Group`] is one named cache namespace. It answers lookups from its
//! local cache, and on a miss resolves the key exactly once across all
//! concurrent callers: first by asking the owning peer, then by falling back
//! to the source loader.
//!
//! # Lookup flow
//!
//! ```text
//!  get(key)
//!     │
//!     ├── key empty ─────────────────────────────▶ Err(EmptyKey)
//!     │
//!     ├── local cache hit ───────────────────────▶ Ok(view)
//!     │
//!     ▼
//!  FlightGroup::run(key)          (one load per key at a time)
//!     │
//!     ├── peer picker → remote owner
//!     │      ├── fetch ok ───────────────────────▶ Ok(view)   not cached
//!     │      └── fetch failed ── warn, fall through
//!     │
//!     └── SourceLoader::load ── copy ── populate ▶ Ok(view)
//! ```

mod registry;

pub use registry::GroupRegistry;

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, instrument, warn};

use crate::cache::{ByteCache, ByteView, CacheStats};
use crate::domain::ports::{
    EvictionObserver, FetchRequest, PeerFetcher, PeerPicker, SourceLoader,
};
use crate::error::{Error, Result};
use crate::flight::FlightGroup;
use crate::metrics::{GroupStats, StatsSnapshot};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a group
#[derive(Clone, Default)]
pub struct GroupConfig {
    /// Byte budget of the local cache (0 = unbounded)
    pub max_bytes: u64,

    /// Notified for every entry evicted from the local cache
    pub eviction_observer: Option<Arc<dyn EvictionObserver<ByteView>>>,
}

impl GroupConfig {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            eviction_observer: None,
        }
    }

    pub fn with_eviction_observer(mut self, observer: Arc<dyn EvictionObserver<ByteView>>) -> Self {
        self.eviction_observer = Some(observer);
        self
    }
}

impl std::fmt::Debug for GroupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupConfig")
            .field("max_bytes", &self.max_bytes)
            .field("eviction_observer", &self.eviction_observer.is_some())
            .finish()
    }
}

// =============================================================================
// Group
// =============================================================================

/// A named, read-through cache namespace
pub struct Group {
    name: String,
    loader: Arc<dyn SourceLoader>,
    main_cache: ByteCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    flight: FlightGroup<Result<ByteView>>,
    stats: GroupStats,
}

impl Group {
    /// Create a standalone group; most callers go through [`GroupRegistry`]
    pub fn new(name: impl Into<String>, config: GroupConfig, loader: Arc<dyn SourceLoader>) -> Self {
        let main_cache = match config.eviction_observer {
            Some(observer) => ByteCache::with_observer(config.max_bytes, observer),
            None => ByteCache::new(config.max_bytes),
        };

        Self {
            name: name.into(),
            loader,
            main_cache,
            peers: OnceCell::new(),
            flight: FlightGroup::new(),
            stats: GroupStats::new(),
        }
    }

    /// Get the group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the peer picker used to route misses.
    ///
    /// A group accepts one picker for its lifetime.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(peers)
            .map_err(|_| Error::PeersAlreadyRegistered(self.name.clone()))
    }

    /// Look up `key`, loading it on a miss
    #[instrument(skip(self), fields(group = %self.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.stats.record_get();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_cache_hit();
            debug!("cache hit");
            return Ok(value);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.record_load();
        self.flight
            .run(key, || async {
                self.stats.record_load_deduped();

                if let Some(peer) = self.peers.get().and_then(|p| p.pick_peer(key)) {
                    match self.load_from_peer(peer.as_ref(), key).await {
                        Ok(value) => {
                            self.stats.record_peer_load();
                            return Ok(value);
                        }
                        Err(e) => {
                            self.stats.record_peer_error();
                            warn!(peer = peer.peer_id(), error = %e, "failed to get from peer, loading locally");
                        }
                    }
                }

                self.load_locally(key).await
            })
            .await
    }

    async fn load_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView> {
        let response = peer.fetch(&FetchRequest::new(self.name.as_str(), key)).await?;
        debug!(peer = peer.peer_id(), "loaded from peer");
        Ok(ByteView::from(response.value))
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView> {
        let bytes = match self.loader.load(key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.stats.record_local_load_err();
                debug!(error = %e, "source load failed");
                return Err(e);
            }
        };
        self.stats.record_local_load();

        // the loader may reuse its buffer; the cache keeps its own copy
        let value = ByteView::copy_from_slice(&bytes);
        self.populate_cache(key, value.clone());
        Ok(value)
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }

    /// Record a request served to a remote peer
    pub(crate) fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    /// Get lookup counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Get local cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.main_cache.stats()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .field("in_flight", &self.flight.in_flight())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
