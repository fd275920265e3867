// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Parley gateway.
//!
//! Implements [`parley_core::DocumentStore`] over a single `documents` table
//! keyed by `(collection, id)` with JSON bodies. Upserts merge partial
//! documents; all writes go through one tokio-rusqlite background thread.

pub mod database;
pub mod documents;

pub use database::Database;
pub use documents::SqliteDocumentStore;
