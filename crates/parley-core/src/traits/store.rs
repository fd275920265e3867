// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backing store trait with partial-document upsert semantics.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ParleyError;
use crate::types::Collection;

/// Document-oriented backing store.
///
/// `upsert` MUST merge the given partial document into any existing row
/// (field-level last-write-wins, recursive merge for nested objects) rather
/// than replacing it wholesale — the write-behind queue depends on this to
/// stay correct when flush cycles from different processes interleave.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Merges `patch` into the document at `(collection, id)`, creating it if
    /// absent. Idempotent for a given patch.
    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<(), ParleyError>;

    /// Returns the full document, or `None` if it does not exist.
    async fn select(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, ParleyError>;

    /// Deletes the document entirely. Deleting a missing document is not an
    /// error.
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), ParleyError>;
}
