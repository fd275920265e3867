// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Parley conversational gateway.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Parley workspace. The conversation,
//! session, and cache crates build on the seams defined here.

pub mod error;
pub mod json;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{BackendError, ParleyError};
pub use types::{Collection, SubscriptionTier, ToneId, UserId};

pub use traits::{DocumentStore, ModelBackend, Moderator, NoProgress, ProgressSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_trait_seams_are_exported() {
        // Compile-time check that every collaborator seam is reachable
        // through the public API.
        fn _assert_backend<T: ModelBackend>() {}
        fn _assert_moderator<T: Moderator>() {}
        fn _assert_store<T: DocumentStore>() {}
        fn _assert_progress<T: ProgressSink>() {}
    }

    #[test]
    fn no_progress_discards_notices() {
        let sink = NoProgress;
        sink.on_retry(1, std::time::Duration::from_secs(5));
    }
}
