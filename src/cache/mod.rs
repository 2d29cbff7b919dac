//! Bounded in-memory cache
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        ByteCache                          │
//! │               (one mutex, stats counters)                 │
//! ├──────────────────────────────────────────────────────────┤
//! │                     LruCache<ByteView>                    │
//! │  ┌────────────────────┐      ┌─────────────────────────┐  │
//! │  │ key → slot index   │ ───▶ │ slot arena + MRU↔LRU    │  │
//! │  │ (HashMap)          │      │ doubly-linked by index  │  │
//! │  └────────────────────┘      └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Size of an entry is `key.len() + value.len()`. A budget of zero disables
//! eviction entirely.

mod lru;
mod store;
mod view;

#[cfg(test)]
mod proptest;

pub use lru::{LruCache, Weighted};
pub use store::{ByteCache, CacheStats};
pub use view::ByteView;
