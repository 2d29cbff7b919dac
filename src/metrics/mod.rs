//! Metrics module
//!
//! Lookup counters kept by every group and their Prometheus exposition.

mod collector;
mod stats;

pub use collector::{encode_text, RegistryCollector};
pub use stats::{GroupStats, StatsSnapshot};
