// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits for Parley's external collaborators.
//!
//! The core never talks to a provider API, a moderation endpoint, or a
//! database driver directly; everything crosses one of these seams.

pub mod backend;
pub mod moderation;
pub mod progress;
pub mod store;

pub use backend::ModelBackend;
pub use moderation::Moderator;
pub use progress::{NoProgress, ProgressSink};
pub use store::DocumentStore;
