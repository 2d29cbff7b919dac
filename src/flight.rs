//! Request coalescing ("single flight")
//!
//! Collapses concurrent loads of the same key into one computation. The first
//! caller for a key becomes the leader and runs the computation on its own
//! task; callers arriving while it runs wait on a one-shot completion signal
//! and receive a clone of the leader's result, errors included.
//!
//! # Design
//!
//! - In-flight calls live in a `DashMap`; its shard lock is held only while a
//!   call is registered, joined or removed, never across the computation.
//! - Completion is a `tokio::sync::watch` channel, so any number of waiters
//!   observe one result without polling.
//! - Nothing is cached here: once the leader finishes, the entry is removed
//!   and the next call for the key computes afresh.
//! - If the leader's future is dropped before finishing, its entry is removed
//!   and the waiters race to become the new leader.

use std::future::Future;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::watch;
use tracing::trace;

/// Per-key coalescing of concurrent computations
pub struct FlightGroup<T> {
    calls: DashMap<String, watch::Receiver<Option<T>>>,
}

impl<T> Default for FlightGroup<T> {
    fn default() -> Self {
        Self {
            calls: DashMap::new(),
        }
    }
}

/// Removes the leader's entry when the call finishes or is abandoned
struct InFlight<'a, T> {
    calls: &'a DashMap<String, watch::Receiver<Option<T>>>,
    key: &'a str,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        self.calls.remove(self.key);
    }
}

impl<T: Clone> FlightGroup<T> {
    /// Create an empty group
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` for `key` unless a computation for it is already in
    /// flight, in which case wait for and share that computation's result.
    pub async fn run<F, Fut>(&self, key: &str, compute: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let tx = loop {
            let mut rx = match self.calls.entry(key.to_string()) {
                Entry::Occupied(call) => call.get().clone(),
                Entry::Vacant(slot) => {
                    let (tx, rx) = watch::channel(None);
                    slot.insert(rx);
                    break tx;
                }
            };

            trace!(key, "joining in-flight call");
            if let Ok(result) = rx.wait_for(Option::is_some).await {
                if let Some(value) = (*result).clone() {
                    return value;
                }
            }
            trace!(key, "in-flight call abandoned, retrying");
        };

        let in_flight = InFlight {
            calls: &self.calls,
            key,
        };
        let value = compute().await;

        // callers arriving from here on start a new flight
        drop(in_flight);
        tx.send_replace(Some(value.clone()));
        value
    }

    /// Number of keys with a computation in flight
    pub fn in_flight(&self) -> usize {
        self.calls.len()
    }
}

impl<T> std::fmt::Debug for FlightGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlightGroup")
            .field("in_flight", &self.calls.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
