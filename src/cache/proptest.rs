//! Property-Based Tests for the LRU
//!
//! # Test Properties
//!
//! 1. **Byte Accounting**: used bytes always equal the sum of held entry sizes
//! 2. **Budget**: used bytes never exceed a non-zero budget after `add`
//! 3. **Recency Order**: the cache agrees with a naive ordered-list model

#![cfg(test)]

use proptest::prelude::*;

use super::lru::LruCache;

#[derive(Debug, Clone)]
enum Op {
    Add(String, String),
    Get(String),
    Remove(String),
}

/// Small key space so operations collide often.
fn op_strategy() -> impl Strategy<Value = Op> {
    let key = prop::sample::select(vec!["a", "b", "c", "d", "e", "f", "gg", "hhh"])
        .prop_map(str::to_string);
    let value = "[a-z]{0,12}";
    prop_oneof![
        4 => (key.clone(), value).prop_map(|(k, v)| Op::Add(k, v)),
        3 => key.clone().prop_map(Op::Get),
        1 => key.prop_map(Op::Remove),
    ]
}

/// Reference model: vector ordered from most to least recently used.
#[derive(Default)]
struct Model {
    entries: Vec<(String, String)>,
    max_bytes: u64,
}

impl Model {
    fn size(&self) -> u64 {
        self.entries
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Add(k, v) => {
                self.entries.retain(|(key, _)| key != k);
                self.entries.insert(0, (k.clone(), v.clone()));
                while self.max_bytes != 0 && self.size() > self.max_bytes {
                    self.entries.pop();
                }
            }
            Op::Get(k) => {
                if let Some(pos) = self.entries.iter().position(|(key, _)| key == k) {
                    let entry = self.entries.remove(pos);
                    self.entries.insert(0, entry);
                }
            }
            Op::Remove(k) => self.entries.retain(|(key, _)| key != k),
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: byte accounting matches the held entries and respects the budget.
    #[test]
    fn prop_byte_accounting(
        max_bytes in prop_oneof![Just(0u64), 1u64..64],
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut lru = LruCache::new(max_bytes);

        for op in &ops {
            match op {
                Op::Add(k, v) => lru.add(k.as_str(), v.clone()),
                Op::Get(k) => { lru.get(k); }
                Op::Remove(k) => { lru.remove(k); }
            }

            let held: u64 = lru
                .keys()
                .iter()
                .map(|k| (k.len() + lru.peek(k).map_or(0, String::len)) as u64)
                .sum();
            prop_assert_eq!(lru.used_bytes(), held);
            prop_assert_eq!(lru.keys().len(), lru.len());
            if max_bytes != 0 {
                prop_assert!(lru.used_bytes() <= max_bytes);
            }
        }
    }

    /// Property: recency order and contents match the reference model.
    #[test]
    fn prop_matches_model(
        max_bytes in prop_oneof![Just(0u64), 4u64..48],
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut lru = LruCache::new(max_bytes);
        let mut model = Model { max_bytes, ..Default::default() };

        for op in &ops {
            match op {
                Op::Add(k, v) => lru.add(k.as_str(), v.clone()),
                Op::Get(k) => { lru.get(k); }
                Op::Remove(k) => { lru.remove(k); }
            }
            model.apply(op);

            prop_assert_eq!(lru.keys(), model.keys());
            for (k, v) in &model.entries {
                prop_assert_eq!(lru.peek(k), Some(v));
            }
        }
    }
}
