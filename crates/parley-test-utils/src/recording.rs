// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording progress sink and a configurable moderator.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use parley_core::types::{ModerationContext, ModerationVerdict};
use parley_core::{Moderator, ParleyError, ProgressSink};

/// Captures every retry notice for assertions.
#[derive(Default)]
pub struct RecordingProgress {
    notices: Mutex<Vec<(u32, Duration)>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<(u32, Duration)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_retry(&self, attempt: u32, delay: Duration) {
        self.notices.lock().unwrap().push((attempt, delay));
    }
}

/// Flags content containing any configured needle; optionally errors on
/// every check to exercise moderation-outage tolerance.
#[derive(Default)]
pub struct MockModerator {
    flag_needles: Vec<String>,
    always_fail: bool,
}

impl MockModerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flagging(mut self, needles: &[&str]) -> Self {
        self.flag_needles = needles.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn failing(mut self) -> Self {
        self.always_fail = true;
        self
    }
}

#[async_trait]
impl Moderator for MockModerator {
    async fn check(
        &self,
        content: &str,
        _context: &ModerationContext,
    ) -> Result<ModerationVerdict, ParleyError> {
        if self.always_fail {
            return Err(ParleyError::Internal("moderation offline".to_string()));
        }
        let flagged = self.flag_needles.iter().any(|n| content.contains(n));
        Ok(ModerationVerdict {
            flagged,
            blocked: false,
            scores: Default::default(),
        })
    }
}
