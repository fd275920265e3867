// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write-behind cache and persistence queue.
//!
//! [`WriteBehind`] keeps two maps keyed by `(Collection, id)`: a read-through
//! cache for fast lookups and a staging queue of pending partial updates.
//! Repeated updates to one key merge into a single queued entry; a periodic
//! flush upserts each entry to the backing store independently, re-queuing on
//! failure. An update is never dropped on failure — dropping would
//! desynchronize cache and store permanently.
//!
//! Cache updates are additionally broadcast to sibling workers' caches,
//! best-effort and fire-and-forget.

pub mod task;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use parley_bus::{ReplicaEvent, ReplicationBus, WorkerId};
use parley_core::json::{merge_patch, merged};
use parley_core::types::Collection;
use parley_core::{DocumentStore, ParleyError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

type Key = (Collection, String);

#[derive(Default)]
struct State {
    cache: HashMap<Key, Value>,
    queue: HashMap<Key, Value>,
}

/// Outcome of one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub flushed: usize,
    pub failed: usize,
}

/// The write-behind cache/queue. Constructed once per worker and injected
/// wherever staging or lookups are needed; not a global.
pub struct WriteBehind {
    store: Arc<dyn DocumentStore>,
    bus: Option<(ReplicationBus, WorkerId)>,
    // Held only for map operations, never across an await.
    state: Mutex<State>,
}

impl WriteBehind {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            bus: None,
            state: Mutex::new(State::default()),
        }
    }

    /// Attaches a replication bus so cache updates fan out to siblings.
    pub fn with_bus(mut self, bus: ReplicationBus, worker: WorkerId) -> Self {
        self.bus = Some((bus, worker));
        self
    }

    /// Immediate read-through cache update, visible to subsequent reads in
    /// this process instantly; broadcast to sibling caches best-effort.
    pub fn set_cache(&self, collection: Collection, key: &str, value: Value) {
        self.state
            .lock()
            .expect("cache state poisoned")
            .cache
            .insert((collection, key.to_string()), value.clone());

        if let Some((bus, worker)) = &self.bus {
            bus.publish(
                *worker,
                ReplicaEvent::CacheSet {
                    collection,
                    key: key.to_string(),
                    value,
                },
            );
        }
    }

    /// Applies a cache update received from a sibling. No re-broadcast.
    pub fn apply_remote_set(&self, collection: Collection, key: &str, value: Value) {
        self.state
            .lock()
            .expect("cache state poisoned")
            .cache
            .insert((collection, key.to_string()), value);
    }

    /// Merges a partial update into the pending queue entry for this key,
    /// creating one if absent. One pending entry per key, always.
    pub fn add_to_queue(&self, collection: Collection, key: &str, patch: Value) {
        let mut state = self.state.lock().expect("cache state poisoned");
        let slot = state
            .queue
            .entry((collection, key.to_string()))
            .or_insert(Value::Null);
        if slot.is_null() {
            *slot = patch;
        } else {
            merge_patch(slot, patch);
        }
    }

    /// Cached value for this key, if any. Does not touch the store.
    pub fn peek_cache(&self, collection: Collection, key: &str) -> Option<Value> {
        self.state
            .lock()
            .expect("cache state poisoned")
            .cache
            .get(&(collection, key.to_string()))
            .cloned()
    }

    /// Pending queued update for this key, if any.
    pub fn peek_queue(&self, collection: Collection, key: &str) -> Option<Value> {
        self.state
            .lock()
            .expect("cache state poisoned")
            .queue
            .get(&(collection, key.to_string()))
            .cloned()
    }

    /// Number of entries awaiting flush.
    pub fn queue_len(&self) -> usize {
        self.state.lock().expect("cache state poisoned").queue.len()
    }

    /// Returns the cached value if present, else queries the backing store,
    /// warming the cache on a hit. `Ok(None)` when the document exists in
    /// neither. Store errors surface to the caller.
    pub async fn fetch(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<Value>, ParleyError> {
        if let Some(value) = self.peek_cache(collection, key) {
            return Ok(Some(value));
        }
        match self.store.select(collection, key).await? {
            Some(value) => {
                self.state
                    .lock()
                    .expect("cache state poisoned")
                    .cache
                    .insert((collection, key.to_string()), value.clone());
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// [`fetch`](Self::fetch) plus conversion into a domain shape.
    pub async fn fetch_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        key: &str,
    ) -> Result<Option<T>, ParleyError> {
        match self.fetch(collection, key).await? {
            Some(value) => {
                let converted = serde_json::from_value(value)
                    .map_err(|e| ParleyError::Internal(format!("corrupt document: {e}")))?;
                Ok(Some(converted))
            }
            None => Ok(None),
        }
    }

    /// Drops the cache entry for a key (e.g. after a hard delete).
    pub fn invalidate(&self, collection: Collection, key: &str) {
        self.state
            .lock()
            .expect("cache state poisoned")
            .cache
            .remove(&(collection, key.to_string()));
    }

    /// Removes both the cache entry and any pending queued update for a key,
    /// and broadcasts the purge so sibling caches drop theirs too. Used on
    /// hard deletes, where a later flush must not resurrect the row — on this
    /// worker or on any sibling whose cache was warmed by replication.
    pub fn purge(&self, collection: Collection, key: &str) {
        self.apply_remote_purge(collection, key);

        if let Some((bus, worker)) = &self.bus {
            bus.publish(
                *worker,
                ReplicaEvent::CachePurge {
                    collection,
                    key: key.to_string(),
                },
            );
        }
    }

    /// Applies a purge received from a sibling. No re-broadcast.
    pub fn apply_remote_purge(&self, collection: Collection, key: &str) {
        let mut state = self.state.lock().expect("cache state poisoned");
        state.cache.remove(&(collection, key.to_string()));
        state.queue.remove(&(collection, key.to_string()));
    }

    /// One flush cycle: upsert every queued entry independently.
    ///
    /// Success removes the entry; failure re-queues it for the next cycle,
    /// merged *under* anything staged while the flush was in flight so newer
    /// fields win. A failure on one entry never blocks the others.
    pub async fn flush(&self) -> FlushReport {
        let pending: Vec<(Key, Value)> = {
            let mut state = self.state.lock().expect("cache state poisoned");
            std::mem::take(&mut state.queue).into_iter().collect()
        };

        if pending.is_empty() {
            return FlushReport::default();
        }

        let mut report = FlushReport::default();
        for ((collection, id), value) in pending {
            match self.store.upsert(collection, &id, value.clone()).await {
                Ok(()) => {
                    report.flushed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        collection = %collection,
                        id = id.as_str(),
                        error = %e,
                        "flush failed, entry re-queued for next cycle"
                    );
                    let mut state = self.state.lock().expect("cache state poisoned");
                    match state.queue.remove(&(collection, id.clone())) {
                        // Updates staged mid-flush are newer; they win.
                        Some(newer) => {
                            state.queue.insert((collection, id), merged(value, newer));
                        }
                        None => {
                            state.queue.insert((collection, id), value);
                        }
                    }
                }
            }
        }

        debug!(
            flushed = report.flushed,
            failed = report.failed,
            "flush cycle complete"
        );
        report
    }
}
