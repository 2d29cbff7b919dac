//! Prometheus exposition of group statistics.
//!
//! [`RegistryCollector`] reads every group in a [`GroupRegistry`] at scrape
//! time, so groups created or removed after registration are reflected
//! without re-registering anything.

use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::cache::CacheStats;
use crate::error::{Error, Result};
use crate::group::GroupRegistry;
use crate::metrics::StatsSnapshot;

const NAMESPACE: &str = "peercache";

type Extract = fn(&StatsSnapshot, &CacheStats) -> u64;

/// Collector turning group counters into labelled metric families
pub struct RegistryCollector {
    groups: Arc<GroupRegistry>,
    counters: Vec<(IntCounterVec, Extract)>,
    gauges: Vec<(IntGaugeVec, Extract)>,
    // serializes reset/fill of the vectors between concurrent scrapes
    scrape: Mutex<()>,
}

impl RegistryCollector {
    /// Create a collector over `groups`
    pub fn new(groups: Arc<GroupRegistry>) -> Result<Self> {
        let counter_defs: [(&str, &str, Extract); 10] = [
            ("gets_total", "Lookups requested", |s, _| s.gets),
            ("cache_hits_total", "Lookups answered from the local cache", |s, _| s.cache_hits),
            ("peer_loads_total", "Values fetched from the owning peer", |s, _| s.peer_loads),
            ("peer_errors_total", "Failed peer fetches", |s, _| s.peer_errors),
            ("loads_total", "Lookups that missed the local cache", |s, _| s.loads),
            ("loads_deduped_total", "Misses after request coalescing", |s, _| s.loads_deduped),
            ("local_loads_total", "Values produced by the source loader", |s, _| s.local_loads),
            ("local_load_errors_total", "Failed source loads", |s, _| s.local_load_errs),
            ("server_requests_total", "Requests served to peers", |s, _| s.server_requests),
            ("cache_evictions_total", "Entries evicted from the local cache", |_, c| c.evictions),
        ];
        let gauge_defs: [(&str, &str, Extract); 3] = [
            ("cache_bytes", "Bytes held by the local cache", |_, c| c.bytes),
            ("cache_entries", "Entries held by the local cache", |_, c| c.entries),
            ("cache_max_bytes", "Byte budget of the local cache", |_, c| c.max_bytes),
        ];

        let mut counters = Vec::with_capacity(counter_defs.len());
        for (name, help, extract) in counter_defs {
            let vec = IntCounterVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
                .map_err(|e| Error::Internal(format!("Invalid metric {}: {}", name, e)))?;
            counters.push((vec, extract));
        }

        let mut gauges = Vec::with_capacity(gauge_defs.len());
        for (name, help, extract) in gauge_defs {
            let vec = IntGaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &["group"])
                .map_err(|e| Error::Internal(format!("Invalid metric {}: {}", name, e)))?;
            gauges.push((vec, extract));
        }

        Ok(Self {
            groups,
            counters,
            gauges,
            scrape: Mutex::new(()),
        })
    }
}

impl Collector for RegistryCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.counters
            .iter()
            .flat_map(|(vec, _)| vec.desc())
            .chain(self.gauges.iter().flat_map(|(vec, _)| vec.desc()))
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _scrape = self.scrape.lock();

        // removed groups must disappear from the output
        for (vec, _) in &self.counters {
            vec.reset();
        }
        for (vec, _) in &self.gauges {
            vec.reset();
        }

        for name in self.groups.group_names() {
            let Some(group) = self.groups.get_group(&name) else {
                continue;
            };
            let stats = group.stats();
            let cache = group.cache_stats();

            for (vec, extract) in &self.counters {
                vec.with_label_values(&[name.as_str()])
                    .inc_by(extract(&stats, &cache));
            }
            for (vec, extract) in &self.gauges {
                vec.with_label_values(&[name.as_str()])
                    .set(extract(&stats, &cache) as i64);
            }
        }

        self.counters
            .iter()
            .flat_map(|(vec, _)| vec.collect())
            .chain(self.gauges.iter().flat_map(|(vec, _)| vec.collect()))
            .collect()
    }
}

impl std::fmt::Debug for RegistryCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCollector")
            .field("groups", &self.groups.group_names())
            .finish()
    }
}

/// Render every metric in `registry` in the text exposition format
pub fn encode_text(registry: &Registry) -> Result<(String, Vec<u8>)> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    Ok((encoder.format_type().to_string(), buffer))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loader_fn;
    use bytes::Bytes;

    fn registry_with_group() -> Arc<GroupRegistry> {
        let groups = Arc::new(GroupRegistry::new());
        groups.new_group(
            "scores",
            1024,
            loader_fn(|key: String| async move { Ok(Bytes::from(key.into_bytes())) }),
        );
        groups
    }

    #[tokio::test]
    async fn test_collects_per_group_metrics() {
        let groups = registry_with_group();
        let group = groups.get_group("scores").unwrap();
        group.get("Tom").await.unwrap();
        group.get("Tom").await.unwrap();

        let registry = Registry::new();
        registry
            .register(Box::new(RegistryCollector::new(Arc::clone(&groups)).unwrap()))
            .unwrap();

        let (content_type, body) = encode_text(&registry).unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("peercache_gets_total{group=\"scores\"} 2"));
        assert!(text.contains("peercache_cache_hits_total{group=\"scores\"} 1"));
        assert!(text.contains("peercache_local_loads_total{group=\"scores\"} 1"));
        assert!(text.contains("peercache_cache_entries{group=\"scores\"} 1"));
    }

    #[tokio::test]
    async fn test_repeated_scrapes_do_not_accumulate() {
        let groups = registry_with_group();
        groups.get_group("scores").unwrap().get("a").await.unwrap();

        let registry = Registry::new();
        registry
            .register(Box::new(RegistryCollector::new(Arc::clone(&groups)).unwrap()))
            .unwrap();

        encode_text(&registry).unwrap();
        let (_, body) = encode_text(&registry).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("peercache_gets_total{group=\"scores\"} 1"));
    }

    #[test]
    fn test_removed_group_disappears() {
        let groups = registry_with_group();
        let registry = Registry::new();
        registry
            .register(Box::new(RegistryCollector::new(Arc::clone(&groups)).unwrap()))
            .unwrap();

        assert!(String::from_utf8(encode_text(&registry).unwrap().1)
            .unwrap()
            .contains("group=\"scores\""));

        groups.remove_group("scores");
        let text = String::from_utf8(encode_text(&registry).unwrap().1).unwrap();
        assert!(!text.contains("group=\"scores\""));
    }
}
