//! Per-group lookup counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Lock-free counters updated on every lookup path of a group
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    local_loads: AtomicU64,
    local_load_errs: AtomicU64,
    server_requests: AtomicU64,
}

impl GroupStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any `get` call, including rejected ones
    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss that entered the coalescer
    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    /// A miss that actually ran the load path (coalescing leader)
    pub fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    /// A request served to a remote peer
    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            loads_deduped: self.loads_deduped.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errs: self.local_load_errs.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`GroupStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
}

impl StatsSnapshot {
    /// Fraction of gets answered from the local cache
    pub fn hit_ratio(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.gets as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_records() {
        let stats = GroupStats::new();
        stats.record_get();
        stats.record_get();
        stats.record_cache_hit();
        stats.record_load();
        stats.record_load_deduped();
        stats.record_local_load();
        stats.record_server_request();

        let snap = stats.snapshot();
        assert_eq!(snap.gets, 2);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.loads, 1);
        assert_eq!(snap.loads_deduped, 1);
        assert_eq!(snap.local_loads, 1);
        assert_eq!(snap.server_requests, 1);
        assert_eq!(snap.peer_errors, 0);
        assert!((snap.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_ratio_without_gets() {
        assert_eq!(GroupStats::new().snapshot().hit_ratio(), 0.0);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(StatsSnapshot {
            gets: 3,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(json["gets"], 3);
        assert_eq!(json["peer_loads"], 0);
    }
}
