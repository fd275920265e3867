// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-conversation cooldown timer.
//!
//! A purely clock-based guard with no side effects: callers check
//! [`Cooldown::active`] before allowing an action and call [`Cooldown::arm`]
//! after successfully performing it. Built on `tokio::time::Instant` so tests
//! can drive it with `tokio::time::pause`/`advance`.

use std::time::Duration;

use tokio::time::Instant;

/// Armed state: when the cooldown started and how long it runs.
#[derive(Debug, Clone, Copy)]
struct Armed {
    started_at: Instant,
    expires_in: Duration,
}

/// A per-entity rate-limit timer.
///
/// Invariant: `active()` iff `now < started_at + expires_in`. `remaining()`
/// is never negative.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    state: Option<Armed>,
}

impl Cooldown {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Arms the cooldown starting now for the given duration.
    pub fn arm(&mut self, duration: Duration) {
        self.state = Some(Armed {
            started_at: Instant::now(),
            expires_in: duration,
        });
    }

    /// Disarms immediately regardless of elapsed time.
    pub fn cancel(&mut self) {
        self.state = None;
    }

    /// Whether the cooldown is currently armed and unexpired.
    pub fn active(&self) -> bool {
        !self.remaining().is_zero()
    }

    /// Time left until the cooldown expires; zero when inactive.
    pub fn remaining(&self) -> Duration {
        match self.state {
            Some(armed) => {
                let deadline = armed.started_at + armed.expires_in;
                deadline.saturating_duration_since(Instant::now())
            }
            None => Duration::ZERO,
        }
    }
}
