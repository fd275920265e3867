// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock collaborators and a wiring harness for Parley tests.
//!
//! Everything here is deterministic: the mock backend replays a script, the
//! memory store injects failures per key, and the harness wires a full
//! manager stack (optionally several sibling workers on one bus) without a
//! database or network.

pub mod harness;
pub mod memory_store;
pub mod mock_backend;
pub mod recording;

pub use harness::TestHarness;
pub use memory_store::MemoryStore;
pub use mock_backend::MockBackend;
pub use recording::{MockModerator, RecordingProgress};
