// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use parley_core::ParleyError;
use tokio_rusqlite::Connection;
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id         TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    PRIMARY KEY (collection, id)
);
";

/// The single writer for all Parley persistence.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens (or creates) the database at `path`, applies PRAGMAs and the
    /// schema.
    pub async fn open(path: &str) -> Result<Self, ParleyError> {
        let conn = Connection::open(path)
            .await
            .map_err(|e| map_tr_err(e.into()))?;
        Self::setup(conn).await
    }

    /// Opens an in-memory database. Test use only.
    pub async fn open_in_memory() -> Result<Self, ParleyError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| map_tr_err(e.into()))?;
        Self::setup(conn).await
    }

    async fn setup(conn: Connection) -> Result<Self, ParleyError> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
            )?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!("database opened and schema applied");
        Ok(Self { conn })
    }

    /// The underlying single-writer connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Closes the background connection thread.
    pub async fn close(&self) -> Result<(), ParleyError> {
        self.conn
            .clone()
            .close()
            .await
            .map_err(|e| ParleyError::Database {
                source: Box::new(e),
            })
    }
}

/// Maps a tokio-rusqlite error into the surfaced taxonomy.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> ParleyError {
    ParleyError::Database {
        source: Box::new(e),
    }
}
