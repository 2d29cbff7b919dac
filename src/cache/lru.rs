//! Byte-budgeted LRU cache
//!
//! Entries live in a slot arena. Recency order is an intrusive doubly-linked
//! list threaded through the slots by index, and a key→slot map gives O(1)
//! lookup. Both structures are always updated together.
//!
//! The cache is not synchronized; [`ByteCache`](super::ByteCache) wraps it in
//! a mutex for shared use.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::ports::EvictionObserver;

/// Values that can report how many bytes they occupy
pub trait Weighted {
    /// Size of the value in bytes
    fn weight(&self) -> usize;
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weighted for bytes::Bytes {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Arena slot
struct Node<V> {
    key: String,
    value: V,
    /// key length + value weight
    size: u64,
    /// Towards the most recently used end
    prev: Option<usize>,
    /// Towards the least recently used end
    next: Option<usize>,
}

/// LRU cache bounded by the total byte size of keys and values.
///
/// A `max_bytes` of zero means unbounded.
pub struct LruCache<V> {
    max_bytes: u64,
    used_bytes: u64,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    evictions: u64,
    on_evicted: Option<Arc<dyn EvictionObserver<V>>>,
}

#[inline]
fn entry_size<V: Weighted>(key: &str, value: &V) -> u64 {
    (key.len() + value.weight()) as u64
}

impl<V: Weighted> LruCache<V> {
    /// Create a cache holding at most `max_bytes` bytes (0 = unbounded)
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            evictions: 0,
            on_evicted: None,
        }
    }

    /// Create a cache that reports every eviction to `observer`
    pub fn with_observer(max_bytes: u64, observer: Arc<dyn EvictionObserver<V>>) -> Self {
        let mut cache = Self::new(max_bytes);
        cache.on_evicted = Some(observer);
        cache
    }

    /// Look up `key`, marking it most recently used on a hit
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.move_to_front(idx);
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Look up `key` without touching recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        self.slots[idx].as_ref().map(|node| &node.value)
    }

    /// Check if the key is held
    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Insert or replace `key`, then evict from the LRU end until the byte
    /// budget holds again.
    ///
    /// The entry just added is itself evicted if it alone exceeds the budget.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let size = entry_size(&key, &value);

        if let Some(&idx) = self.index.get(&key) {
            if let Some(node) = self.slots[idx].as_mut() {
                self.used_bytes = self.used_bytes - node.size + size;
                node.value = value;
                node.size = size;
            }
            self.move_to_front(idx);
        } else {
            let idx = self.alloc(Node {
                key: key.clone(),
                value,
                size,
                prev: None,
                next: None,
            });
            self.index.insert(key, idx);
            self.push_front(idx);
            self.used_bytes += size;
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evict the least recently used entry, notifying the observer
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let idx = self.tail?;
        let node = self.take(idx)?;
        self.evictions += 1;
        if let Some(observer) = &self.on_evicted {
            observer.on_evicted(&node.key, &node.value);
        }
        Some((node.key, node.value))
    }

    /// Remove `key` explicitly. Not counted as an eviction.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let idx = *self.index.get(key)?;
        self.take(idx).map(|node| node.value)
    }

    /// Drop every entry. Not counted as evictions.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
        self.used_bytes = 0;
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently accounted (keys + values)
    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Byte budget (0 = unbounded)
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Entries evicted so far
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            match self.slots[idx].as_ref() {
                Some(node) => {
                    keys.push(node.key.clone());
                    cursor = node.next;
                }
                None => break,
            }
        }
        keys
    }

    // -------------------------------------------------------------------------
    // Arena and list plumbing
    // -------------------------------------------------------------------------

    fn alloc(&mut self, node: Node<V>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    /// Unlink the slot, free it and drop it from the index
    fn take(&mut self, idx: usize) -> Option<Node<V>> {
        self.detach(idx);
        let node = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        self.index.remove(&node.key);
        self.used_bytes -= node.size;
        Some(node)
    }

    fn set_prev(&mut self, idx: usize, prev: Option<usize>) {
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = prev;
        }
    }

    fn set_next(&mut self, idx: usize, next: Option<usize>) {
        if let Some(node) = self.slots[idx].as_mut() {
            node.next = next;
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_ref() {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => self.set_next(p, next),
            None => self.head = next,
        }
        match next {
            Some(n) => self.set_prev(n, prev),
            None => self.tail = prev,
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.set_prev(h, Some(idx));
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }
}

impl<V> std::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("entries", &self.index.len())
            .field("evictions", &self.evictions)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_get_hit_and_miss() {
        let mut lru = LruCache::new(0);
        lru.add("key1", s("1234"));

        assert_eq!(lru.get("key1"), Some(&s("1234")));
        assert_eq!(lru.get("key2"), None);
    }

    #[test]
    fn test_remove_oldest_when_over_budget() {
        let (k1, k2, k3) = ("key1", "key2", "key3");
        let (v1, v2, v3) = ("value1", "value2", "v3");
        let cap = (k1.len() + k2.len() + v1.len() + v2.len()) as u64;

        let mut lru = LruCache::new(cap);
        lru.add(k1, s(v1));
        lru.add(k2, s(v2));
        lru.add(k3, s(v3));

        assert!(lru.get(k1).is_none());
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evictions(), 1);
    }

    #[test]
    fn test_eviction_observer_sees_keys_in_lru_order() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let observer = move |key: &str, _value: &String| sink.lock().push(key.to_string());

        let mut lru = LruCache::with_observer(10, Arc::new(observer));
        lru.add("key1", s("123456"));
        lru.add("k2", s("k2"));
        lru.add("k3", s("k3"));
        lru.add("k4", s("k4"));

        assert_eq!(*evicted.lock(), vec![s("key1"), s("k2")]);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut lru = LruCache::new(12);
        lru.add("a", s("11111"));
        lru.add("b", s("22222"));

        // touch "a" so "b" becomes the eviction candidate
        lru.get("a");
        lru.add("c", s("3"));

        assert!(lru.contains("a"));
        assert!(!lru.contains("b"));
        assert!(lru.contains("c"));
    }

    #[test]
    fn test_peek_does_not_refresh_recency() {
        let mut lru = LruCache::new(12);
        lru.add("a", s("11111"));
        lru.add("b", s("22222"));

        assert_eq!(lru.peek("a"), Some(&s("11111")));
        lru.add("c", s("3"));

        assert!(!lru.contains("a"));
        assert!(lru.contains("b"));
    }

    #[test]
    fn test_update_adjusts_byte_accounting() {
        let mut lru = LruCache::new(0);
        lru.add("key", s("ab"));
        assert_eq!(lru.used_bytes(), 5);

        lru.add("key", s("abcdef"));
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.used_bytes(), 9);

        lru.add("key", s(""));
        assert_eq!(lru.used_bytes(), 3);
    }

    #[test]
    fn test_update_moves_entry_to_front() {
        let mut lru = LruCache::new(0);
        lru.add("a", s("1"));
        lru.add("b", s("2"));
        lru.add("c", s("3"));
        assert_eq!(lru.keys(), vec![s("c"), s("b"), s("a")]);

        lru.add("a", s("9"));
        assert_eq!(lru.keys(), vec![s("a"), s("c"), s("b")]);
    }

    #[test]
    fn test_zero_budget_is_unbounded() {
        let mut lru = LruCache::new(0);
        for i in 0..1000 {
            lru.add(format!("key-{}", i), s("some value bytes"));
        }

        assert_eq!(lru.len(), 1000);
        assert_eq!(lru.evictions(), 0);
    }

    #[test]
    fn test_oversized_value_evicts_everything_including_itself() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let observer = move |key: &str, _value: &String| sink.lock().push(key.to_string());

        let mut lru = LruCache::with_observer(10, Arc::new(observer));
        lru.add("a", s("1"));
        lru.add("b", s("2"));
        lru.add("huge", s("0123456789"));

        assert!(lru.is_empty());
        assert_eq!(lru.used_bytes(), 0);
        assert_eq!(*evicted.lock(), vec![s("a"), s("b"), s("huge")]);
    }

    #[test]
    fn test_remove_is_not_an_eviction() {
        let mut lru = LruCache::new(0);
        lru.add("a", s("1"));
        lru.add("b", s("2"));

        assert_eq!(lru.remove("a"), Some(s("1")));
        assert_eq!(lru.remove("a"), None);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.used_bytes(), 2);
        assert_eq!(lru.evictions(), 0);
    }

    #[test]
    fn test_slots_are_reused_after_removal() {
        let mut lru = LruCache::new(0);
        for round in 0..5 {
            lru.add("x", s("1"));
            lru.add("y", s("2"));
            lru.remove("x");
            lru.remove("y");
            assert!(lru.is_empty(), "round {}", round);
        }
        assert!(lru.slots.len() <= 2);
    }

    #[test]
    fn test_remove_oldest_on_empty_cache() {
        let mut lru: LruCache<String> = LruCache::new(0);
        assert!(lru.remove_oldest().is_none());
    }

    #[test]
    fn test_clear() {
        let mut lru = LruCache::new(0);
        for i in 0..10 {
            lru.add(format!("k{}", i), vec![0u8; 10]);
        }
        assert_eq!(lru.used_bytes(), 120);

        lru.clear();
        assert!(lru.is_empty());
        assert_eq!(lru.used_bytes(), 0);
        assert!(lru.keys().is_empty());

        lru.add("again", vec![1u8; 3]);
        assert_eq!(lru.keys(), vec![s("again")]);
    }
}
