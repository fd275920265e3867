// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage policy for the Parley gateway: cooldown timers, subscription-tier
//! modifiers, the tone catalog, and user standing.
//!
//! Everything here is a pure in-memory guard. Callers check the guard before
//! acting and update it after acting; no policy component performs I/O.

pub mod cooldown;
pub mod standing;
pub mod tier;
pub mod tone;

pub use cooldown::Cooldown;
pub use standing::{Standing, StandingStatus};
pub use tier::{effective_cooldown, tier_multiplier};
pub use tone::{Tone, ToneCatalog};
