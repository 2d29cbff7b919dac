//! Domain Layer
//!
//! Capability traits (ports) the lookup core consumes, and the value objects
//! that cross them.
//!
//! # Usage
//!
//! ```ignore
//! use peercache::domain::ports::{PeerPicker, SourceLoader};
//!
//! // Inject capabilities at construction time
//! let group = registry.new_group("scores", 2 << 10, loader);
//! group.register_peers(pool)?;
//! ```

pub mod ports;

// Re-export commonly used types
pub use ports::{
    loader_fn, EvictionObserver, FetchRequest, FetchResponse, FnLoader, PeerFetcher, PeerPicker,
    SourceLoader,
};
