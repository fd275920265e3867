// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tone catalog: personality/model-routing entries with cooldown modifiers
//! and premium restrictions.

use std::time::Duration;

use parley_config::model::ToneEntry;
use parley_core::{ParleyError, SubscriptionTier, ToneId};

/// One tone in the catalog. Conversations hold a [`ToneId`] reference into
/// the catalog, never owned tone data.
#[derive(Debug, Clone)]
pub struct Tone {
    pub id: ToneId,
    pub display_name: String,
    /// Model identifier this tone routes generations to.
    pub model: String,
    /// Requires a premium entitlement to select.
    pub premium: bool,
    /// Replaces the configured base cooldown, if set.
    pub cooldown_override: Option<Duration>,
    /// Additional multiplier on top of the tier base.
    pub cooldown_multiplier: f64,
}

/// Static catalog of available tones. The first entry is the default.
#[derive(Debug, Clone)]
pub struct ToneCatalog {
    tones: Vec<Tone>,
}

impl ToneCatalog {
    /// The built-in catalog used when the config defines no tones.
    pub fn builtin() -> Self {
        Self {
            tones: vec![
                Tone {
                    id: ToneId("aria".into()),
                    display_name: "Aria".into(),
                    model: "aria-4".into(),
                    premium: false,
                    cooldown_override: None,
                    cooldown_multiplier: 1.0,
                },
                Tone {
                    id: ToneId("quickfire".into()),
                    display_name: "Quickfire".into(),
                    model: "aria-mini".into(),
                    premium: false,
                    cooldown_override: Some(Duration::from_millis(15_000)),
                    cooldown_multiplier: 1.0,
                },
                Tone {
                    id: ToneId("sage".into()),
                    display_name: "Sage".into(),
                    model: "sage-xl".into(),
                    premium: true,
                    cooldown_override: None,
                    cooldown_multiplier: 2.0,
                },
            ],
        }
    }

    /// Builds a catalog from config entries, falling back to the built-in
    /// catalog when the list is empty.
    pub fn from_entries(entries: &[ToneEntry]) -> Self {
        if entries.is_empty() {
            return Self::builtin();
        }
        Self {
            tones: entries
                .iter()
                .map(|e| Tone {
                    id: ToneId(e.id.clone()),
                    display_name: e.display_name.clone().unwrap_or_else(|| e.id.clone()),
                    model: e.model.clone(),
                    premium: e.premium,
                    cooldown_override: e.cooldown_override_ms.map(Duration::from_millis),
                    cooldown_multiplier: e.cooldown_multiplier,
                })
                .collect(),
        }
    }

    pub fn get(&self, id: &ToneId) -> Option<&Tone> {
        self.tones.iter().find(|t| &t.id == id)
    }

    pub fn default_tone(&self) -> &Tone {
        // from_entries and builtin both guarantee at least one tone.
        &self.tones[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tone> {
        self.tones.iter()
    }

    /// Resolves a tone id, erroring on unknown ids.
    pub fn resolve(&self, id: &ToneId) -> Result<&Tone, ParleyError> {
        self.get(id)
            .ok_or_else(|| ParleyError::Internal(format!("unknown tone: {id}")))
    }

    /// Checks that the user's tier may select this tone.
    pub fn ensure_allowed(
        &self,
        id: &ToneId,
        tier: SubscriptionTier,
    ) -> Result<(), ParleyError> {
        let tone = self.resolve(id)?;
        if tone.premium && !tier.is_premium() {
            return Err(ParleyError::ToneRestricted {
                tone: tone.id.0.clone(),
            });
        }
        Ok(())
    }
}
