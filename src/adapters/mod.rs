//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │        SourceLoader │ PeerPicker │ PeerFetcher              │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ InMemorySource │ HttpPool (picker + server) │ HttpFetcher  │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use peercache::adapters::{serve, HttpPool, PoolConfig};
//!
//! let pool = Arc::new(HttpPool::new(PoolConfig::new("http://10.0.0.1:8001"), groups.clone())?);
//! pool.set_peers(["http://10.0.0.1:8001", "http://10.0.0.2:8001"]);
//! group.register_peers(pool.clone())?;
//!
//! let listener = TcpListener::bind("0.0.0.0:8001").await?;
//! serve(pool, listener).await?;
//! ```

mod http_fetcher;
mod http_pool;
mod memory;

pub use http_fetcher::HttpFetcher;
pub use http_pool::{
    normalize_peer_url, serve, HttpPool, PoolConfig, DEFAULT_BASE_PATH, DEFAULT_REPLICAS,
};
pub use memory::InMemorySource;
