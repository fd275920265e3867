// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model session lifecycle and the bounded session pool.
//!
//! A [`Session`](session::Session) wraps one backend handle and tracks its
//! lifecycle state; the [`SessionPool`](pool::SessionPool) owns a fixed set
//! of sessions and hands out exclusive leases. Acquisition is bounded: it
//! fails fast (or after a configured wait) with `NoFreeSessions` rather than
//! queuing callers indefinitely.

pub mod pool;
pub mod session;

pub use pool::{SessionLease, SessionPool};
pub use session::{Session, SessionState};
