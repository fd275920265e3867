// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document operations over the `documents` table.
//!
//! `upsert` implements the merge semantics the write-behind queue depends on:
//! the existing body is read and the patch merged into it inside a single
//! transaction, so concurrent flush cycles converge to a last-write-wins
//! merge per field rather than clobbering whole documents.

use async_trait::async_trait;
use parley_core::json::merge_patch;
use parley_core::types::Collection;
use parley_core::{DocumentStore, ParleyError};
use rusqlite::params;
use serde_json::Value;

use crate::database::{Database, map_tr_err};

/// SQLite-backed [`DocumentStore`].
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn upsert(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<(), ParleyError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let tx = conn.transaction()?;

                let existing: Option<String> = {
                    let mut stmt = tx.prepare(
                        "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                    )?;
                    stmt.query_row(params![collection, id], |row| row.get(0))
                        .map(Some)
                        .or_else(|e| match e {
                            rusqlite::Error::QueryReturnedNoRows => Ok(None),
                            other => Err(other),
                        })?
                };

                let body = match existing {
                    Some(raw) => {
                        let mut base: Value = serde_json::from_str(&raw)
                            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;
                        merge_patch(&mut base, patch);
                        base
                    }
                    None => patch,
                };
                let serialized = serde_json::to_string(&body)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;

                tx.execute(
                    "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)
                     ON CONFLICT (collection, id) DO UPDATE SET
                         body = excluded.body,
                         updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![collection, id, serialized],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn select(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, ParleyError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let raw: Option<String> = conn
                    .query_row(
                        "SELECT body FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection, id],
                        |row| row.get(0),
                    )
                    .map(Some)
                    .or_else(|e| match e {
                        rusqlite::Error::QueryReturnedNoRows => Ok(None),
                        other => Err(other),
                    })?;
                match raw {
                    Some(raw) => {
                        let value: Value = serde_json::from_str(&raw)
                            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(e.into()))?;
                        Ok(Some(value))
                    }
                    None => Ok(None),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), ParleyError> {
        let collection = collection.to_string();
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection, id],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
