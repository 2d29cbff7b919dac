//! Error types for peercache

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving a key.
///
/// Every variant owns plain data so the type is `Clone`: a single load result
/// is handed to every caller coalesced on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Lookup with an empty key
    #[error("key is empty")]
    EmptyKey,

    /// The source of truth has no value for the key
    #[error("key not found: {key}")]
    NotFound { key: String },

    /// The source loader failed for another reason
    #[error("source load failed: {0}")]
    Source(String),

    /// A remote peer could not be reached or returned garbage
    #[error("peer {peer} fetch failed: {reason}")]
    Peer { peer: String, reason: String },

    /// A remote peer answered with a non-success status
    #[error("peer {peer} returned status {status}")]
    PeerStatus { peer: String, status: u16 },

    /// No group registered under the name
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// A peer picker was already attached to the group
    #[error("peer picker already registered for group: {0}")]
    PeersAlreadyRegistered(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server-side transport failure (bind, accept, malformed request)
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error for `key`
    pub fn not_found(key: impl Into<String>) -> Self {
        Error::NotFound { key: key.into() }
    }

    /// True for input validation failures that never reach a loader
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::EmptyKey)
    }

    /// True when the source reported the key as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// True for failures talking to a remote peer
    pub fn is_peer(&self) -> bool {
        matches!(self, Error::Peer { .. } | Error::PeerStatus { .. })
    }
}
