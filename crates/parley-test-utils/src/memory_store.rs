// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store with per-key failure injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use parley_core::json::merge_patch;
use parley_core::types::Collection;
use parley_core::{DocumentStore, ParleyError};
use serde_json::{json, Value};

/// A [`DocumentStore`] over a `HashMap`, with the same merge-upsert
/// semantics as the SQLite store. Keys marked failing reject upserts until
/// healed, which is how flush-retry behavior gets exercised.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<(Collection, String), Value>>,
    failing: Mutex<HashSet<String>>,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes upserts for `key` fail until [`heal_key`](Self::heal_key).
    pub fn fail_key(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn heal_key(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }

    /// Direct snapshot of a stored document, bypassing the trait.
    pub fn document(&self, collection: Collection, key: &str) -> Option<Value> {
        self.docs
            .lock()
            .unwrap()
            .get(&(collection, key.to_string()))
            .cloned()
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.docs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<(), ParleyError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(id) {
            return Err(ParleyError::Database {
                source: Box::new(std::io::Error::other("injected store failure")),
            });
        }
        let mut docs = self.docs.lock().unwrap();
        let slot = docs
            .entry((collection, id.to_string()))
            .or_insert(json!({}));
        merge_patch(slot, patch);
        Ok(())
    }

    async fn select(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, ParleyError> {
        Ok(self.document(collection, id))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), ParleyError> {
        self.docs
            .lock()
            .unwrap()
            .remove(&(collection, id.to_string()));
        Ok(())
    }
}
