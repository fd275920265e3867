// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machines and the per-worker manager.
//!
//! Each user has at most one [`Conversation`](conversation::Conversation): a
//! replica of their chat state living in every worker that has touched it.
//! The [`ConversationManager`](manager::ConversationManager) owns the local
//! replicas, gates generations through the policy layer, drives the bounded
//! [`retry`] engine against the session pool, and keeps siblings loosely
//! consistent over the replication bus.

pub mod conversation;
pub mod manager;
pub mod retry;

pub use conversation::Conversation;
pub use manager::{run_eviction, run_replication, ConversationManager, GenerationReceipt};
pub use retry::{classify, Disposition, GenerationOutcome};
