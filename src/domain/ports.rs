//! Domain Ports (Port/Adapter Pattern)
//!
//! The capabilities the lookup core depends on. Adapters (in-memory sources,
//! HTTP peers, test stubs) implement these traits; the core never names a
//! concrete backend.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Lookup Core                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ SourceLoader │ PeerPicker │ PeerFetcher │ Eviction  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Adapters                              │
//! │     InMemorySource │ FnLoader │ HttpPool │ HttpFetcher       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Request sent to the peer that owns a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Group (cache namespace) name
    pub group: String,
    /// Key inside the group
    pub key: String,
}

impl FetchRequest {
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}

/// Value returned by the owning peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub value: Bytes,
}

// =============================================================================
// Source Port
// =============================================================================

/// Port for the source of truth consulted on a local miss.
///
/// Called concurrently for different keys; calls for the same key are
/// already collapsed by the group.
///
/// # Example
///
/// ```ignore
/// struct DbLoader { pool: PgPool }
///
/// #[async_trait]
/// impl SourceLoader for DbLoader {
///     async fn load(&self, key: &str) -> Result<Bytes> {
///         // SELECT value FROM scores WHERE name = $1
///     }
/// }
/// ```
#[async_trait]
pub trait SourceLoader: Send + Sync {
    /// Produce the value for `key`
    async fn load(&self, key: &str) -> Result<Bytes>;
}

/// [`SourceLoader`] backed by an async closure
pub struct FnLoader<F> {
    f: F,
}

impl<F> FnLoader<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> SourceLoader for FnLoader<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    async fn load(&self, key: &str) -> Result<Bytes> {
        (self.f)(key.to_string()).await
    }
}

/// Wrap an async closure as a shareable loader
pub fn loader_fn<F, Fut>(f: F) -> Arc<dyn SourceLoader>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Bytes>> + Send + 'static,
{
    Arc::new(FnLoader::new(f))
}

// =============================================================================
// Peer Ports
// =============================================================================

/// Port for fetching a value from a remote peer
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Ask the peer for `request.group` / `request.key`
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;

    /// Identifier used in logs and errors
    fn peer_id(&self) -> &str;
}

/// Port for locating the peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// Return the owning remote peer, or `None` when the key is served locally
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}

// =============================================================================
// Eviction Port
// =============================================================================

/// Port notified synchronously whenever the cache evicts an entry
pub trait EvictionObserver<V>: Send + Sync {
    fn on_evicted(&self, key: &str, value: &V);
}

impl<V, F> EvictionObserver<V> for F
where
    F: Fn(&str, &V) + Send + Sync,
{
    fn on_evicted(&self, key: &str, value: &V) {
        self(key, value)
    }
}

// =============================================================================
// Tests
// =============================================================================
