//! peercache - Distributed read-through cache
//!
//! A cluster of nodes shares one logical cache. Each key is owned by exactly
//! one node, chosen by consistent hashing; other nodes forward misses to the
//! owner instead of hitting the source of truth themselves. Concurrent misses
//! for the same key on one node collapse into a single load.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         GroupRegistry                            │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ Group "scores"                                              │ │
//! │  │  ┌────────────┐  ┌─────────────┐  ┌──────────────────────┐ │ │
//! │  │  │ ByteCache  │  │ FlightGroup │  │ PeerPicker (HttpPool)│ │ │
//! │  │  │ (LRU)      │  │ (coalesce)  │  │  └─ HashRing          │ │ │
//! │  │  └────────────┘  └─────────────┘  └──────────────────────┘ │ │
//! │  │                  SourceLoader (source of truth)             │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - HTTP transport and in-memory source implementing domain ports
//! - [`cache`] - Byte-budgeted LRU cache
//! - [`domain`] - Capability traits consumed by groups
//! - [`error`] - Error types
//! - [`flight`] - Request coalescing
//! - [`group`] - Cache groups and their registry
//! - [`metrics`] - Group counters and Prometheus exposition
//! - [`ring`] - Consistent hash ring

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod flight;
pub mod group;
pub mod metrics;
pub mod ring;

// Re-export commonly used types
pub use adapters::{HttpFetcher, HttpPool, InMemorySource, PoolConfig};
pub use cache::{ByteCache, ByteView, CacheStats, LruCache};
pub use domain::{loader_fn, EvictionObserver, PeerFetcher, PeerPicker, SourceLoader};
pub use error::{Error, Result};
pub use flight::FlightGroup;
pub use group::{Group, GroupConfig, GroupRegistry};
pub use metrics::{GroupStats, RegistryCollector, StatsSnapshot};
pub use ring::HashRing;
