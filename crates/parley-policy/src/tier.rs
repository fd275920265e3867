// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tiered cooldown policy: effective duration from tier and tone modifiers.

use std::time::Duration;

use parley_config::model::CooldownConfig;
use parley_core::SubscriptionTier;

use crate::tone::Tone;

/// Multiplier applied to the base cooldown for a subscription tier.
pub fn tier_multiplier(config: &CooldownConfig, tier: SubscriptionTier) -> f64 {
    match tier {
        SubscriptionTier::Free => config.free_multiplier,
        SubscriptionTier::Voter => config.voter_multiplier,
        SubscriptionTier::GuildPremium => config.guild_premium_multiplier,
        SubscriptionTier::UserPremium => config.user_premium_multiplier,
    }
}

/// Effective cooldown for one generation.
///
/// The tone may replace the configured base duration; the tier multiplier and
/// the tone's own multiplier then stack on top.
pub fn effective_cooldown(
    config: &CooldownConfig,
    tier: SubscriptionTier,
    tone: &Tone,
) -> Duration {
    let base_ms = tone
        .cooldown_override
        .map(|d| d.as_millis() as f64)
        .unwrap_or(config.base_ms as f64);
    let ms = base_ms * tier_multiplier(config, tier) * tone.cooldown_multiplier;
    Duration::from_millis(ms.max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tone::ToneCatalog;
    use parley_core::ToneId;

    fn default_tone(catalog: &ToneCatalog) -> &Tone {
        catalog.default_tone()
    }

    #[test]
    fn free_tier_uses_full_base() {
        let config = CooldownConfig::default();
        let catalog = ToneCatalog::builtin();
        let d = effective_cooldown(&config, SubscriptionTier::Free, default_tone(&catalog));
        assert_eq!(d, Duration::from_millis(config.base_ms));
    }

    #[test]
    fn premium_tiers_shorter_than_free() {
        let config = CooldownConfig::default();
        let catalog = ToneCatalog::builtin();
        let tone = default_tone(&catalog);
        let free = effective_cooldown(&config, SubscriptionTier::Free, tone);
        let voter = effective_cooldown(&config, SubscriptionTier::Voter, tone);
        let guild = effective_cooldown(&config, SubscriptionTier::GuildPremium, tone);
        let user = effective_cooldown(&config, SubscriptionTier::UserPremium, tone);
        assert!(free > voter);
        assert!(voter > guild);
        assert!(guild > user);
    }

    #[test]
    fn tone_override_replaces_base() {
        let config = CooldownConfig::default();
        let tone = Tone {
            id: ToneId("quickfire".into()),
            display_name: "Quickfire".into(),
            model: "aria-mini".into(),
            premium: false,
            cooldown_override: Some(Duration::from_millis(10_000)),
            cooldown_multiplier: 1.0,
        };
        let d = effective_cooldown(&config, SubscriptionTier::Free, &tone);
        assert_eq!(d, Duration::from_millis(10_000));
    }

    #[test]
    fn tone_multiplier_stacks_with_tier() {
        let config = CooldownConfig::default();
        let tone = Tone {
            id: ToneId("sage".into()),
            display_name: "Sage".into(),
            model: "sage-xl".into(),
            premium: true,
            cooldown_override: None,
            cooldown_multiplier: 2.0,
        };
        let d = effective_cooldown(&config, SubscriptionTier::Voter, &tone);
        let expected = config.base_ms as f64 * config.voter_multiplier * 2.0;
        assert_eq!(d, Duration::from_millis(expected as u64));
    }
}
