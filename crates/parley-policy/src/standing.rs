// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit user standing (ban status).
//!
//! Status is a real field toggled by `ban`/`unban`; the infraction counter is
//! kept for audit only and never consulted to derive the status.

use parley_core::ParleyError;
use serde::{Deserialize, Serialize};

/// Current gateway standing of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StandingStatus {
    #[default]
    Good,
    Banned,
}

/// A user's standing record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Standing {
    pub status: StandingStatus,
    /// Total ban/unban actions recorded against this user.
    pub infractions: u32,
}

impl Standing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ban(&mut self) {
        self.status = StandingStatus::Banned;
        self.infractions += 1;
    }

    pub fn unban(&mut self) {
        self.status = StandingStatus::Good;
        self.infractions += 1;
    }

    pub fn is_banned(&self) -> bool {
        self.status == StandingStatus::Banned
    }

    /// Gate used before any generation is admitted.
    pub fn ensure_allowed(&self) -> Result<(), ParleyError> {
        if self.is_banned() {
            return Err(ParleyError::UserBanned);
        }
        Ok(())
    }
}
