//! Consistent hashing ring for key-to-peer mapping.
//!
//! Each real peer is placed on the ring `replicas` times, at
//! `hash("{i}{peer}")` for `i in 0..replicas`. A key belongs to the first
//! virtual node clockwise from `hash(key)`, wrapping past the top of the
//! `u32` space back to the lowest node.
//!
//! Placement is a pure function of the peer set, the replica count and the
//! hash function, so independently built rings on different nodes route
//! every key to the same peer.
//!
//! The ring is additive only. Peer sets change by building a new ring (see
//! [`HttpPool::set_peers`](crate::adapters::HttpPool::set_peers)).

use std::collections::{BTreeSet, HashMap};

/// Hash function placing keys and virtual nodes on the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Default hash: CRC-32 (IEEE)
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Consistent hash ring with virtual nodes
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    /// Sorted virtual node positions
    ring: Vec<u32>,
    /// Virtual node position → real peer
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Create a ring using CRC-32
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, crc32)
    }

    /// Create a ring with a custom hash function
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            ring: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Place peers on the ring.
    ///
    /// Adding a peer that is already present places its virtual nodes a
    /// second time; callers wanting a fixed membership build a fresh ring.
    pub fn add<I, S>(&mut self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for i in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", i, peer).as_bytes());
                self.ring.push(point);
                self.nodes.insert(point, peer.to_string());
            }
        }
        self.ring.sort_unstable();
    }

    /// Peer owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }

        let point = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&p| p < point);
        let node = self.ring[idx % self.ring.len()];
        self.nodes.get(&node).map(String::as_str)
    }

    /// Number of virtual nodes
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if no peer was added
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Virtual nodes per peer
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Distinct real peers, sorted
    pub fn peers(&self) -> Vec<String> {
        self.nodes
            .values()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.ring.len())
            .field("peers", &self.peers())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Parses the input as a decimal number so ring positions are readable
    fn numeric_hash(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_hashing_with_numeric_hash() {
        let mut ring = HashRing::with_hasher(3, numeric_hash);

        // virtual nodes: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);
        assert_eq!(ring.len(), 9);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, peer) in cases {
            assert_eq!(ring.get(key), Some(peer), "key {}", key);
        }

        // 8, 18, 28 now sit on the ring; 27 moves to 28 instead of wrapping
        ring.add(["8"]);
        assert_eq!(ring.get("27"), Some("8"));

        // keys outside the moved range keep their owner
        for (key, peer) in [("2", "2"), ("11", "2"), ("23", "4")] {
            assert_eq!(ring.get(key), Some(peer), "key {}", key);
        }
    }

    #[test]
    fn test_ring_is_sorted() {
        let mut ring = HashRing::new(50);
        ring.add(["10.0.0.1:8001", "10.0.0.2:8001", "10.0.0.3:8001"]);

        assert!(ring.ring.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ring.len(), 150);
        for point in &ring.ring {
            assert!(ring.nodes.contains_key(point));
        }
    }

    #[test]
    fn test_empty_ring() {
        let ring = HashRing::new(10);
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
        assert!(ring.peers().is_empty());
    }

    #[test]
    fn test_wraps_past_highest_node() {
        let mut ring = HashRing::with_hasher(1, numeric_hash);
        ring.add(["5", "7"]);

        assert_eq!(ring.get("6"), Some("7"));
        assert_eq!(ring.get("99"), Some("5"));
    }

    #[test]
    fn test_deterministic_across_rings() {
        let peers = ["http://a:8001", "http://b:8001", "http://c:8001"];

        let mut first = HashRing::new(50);
        first.add(peers);
        // insertion order must not matter
        let mut second = HashRing::new(50);
        second.add(peers.iter().rev());

        for i in 0..1000 {
            let key = format!("key-{}", i);
            assert_eq!(first.get(&key), second.get(&key));
            assert_eq!(first.get(&key), first.get(&key));
        }
    }

    #[test]
    fn test_duplicate_add_doubles_virtual_nodes() {
        let mut ring = HashRing::new(3);
        ring.add(["a"]);
        ring.add(["a"]);

        assert_eq!(ring.len(), 6);
        assert_eq!(ring.peers(), vec!["a".to_string()]);
    }

    #[test]
    fn test_distribution_with_virtual_nodes() {
        let peers = ["peer-1", "peer-2", "peer-3", "peer-4"];
        let mut ring = HashRing::new(200);
        ring.add(peers);

        let mut counts = HashMap::new();
        for i in 0..20000 {
            let key = format!("user:{}", i);
            *counts.entry(ring.get(&key).unwrap()).or_insert(0usize) += 1;
        }

        assert_eq!(counts.len(), 4);
        for peer in peers {
            let share = counts[peer] as f64 / 20000.0;
            assert!(
                (0.10..0.40).contains(&share),
                "{} owns {:.3} of keys",
                peer,
                share
            );
        }
    }

    #[test]
    fn test_adding_peer_moves_only_some_keys() {
        let mut before = HashRing::new(100);
        before.add(["a", "b", "c"]);
        let mut after = before.clone();
        after.add(["d"]);

        let mut moved = 0;
        for i in 0..10000 {
            let key = format!("k{}", i);
            let old = before.get(&key).unwrap();
            let new = after.get(&key).unwrap();
            if old != new {
                assert_eq!(new, "d", "keys only move to the new peer");
                moved += 1;
            }
        }

        assert!(moved > 0);
        assert!(moved < 5000, "{} keys moved", moved);
    }
}
