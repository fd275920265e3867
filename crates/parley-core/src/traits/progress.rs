// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Progress callback passed into generation, replacing ambient event emission.

use std::time::Duration;

/// Receives user-visible progress notices during a generation.
///
/// The transport layer implements this to render "retrying..." notices; the
/// core calls it once per scheduled retry, before the backoff delay.
pub trait ProgressSink: Send + Sync {
    /// A transient failure occurred; attempt `attempt` will be retried after
    /// `delay`. Attempts are 1-based in notices.
    fn on_retry(&self, attempt: u32, delay: Duration);
}

/// A sink that discards all progress notices.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_retry(&self, _attempt: u32, _delay: Duration) {}
}
