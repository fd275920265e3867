// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One user's conversation replica.
//!
//! All mutation happens under the manager's per-user entry mutex; the struct
//! itself is plain data plus transition methods. The `locked` flag is the
//! single-flight guard for generations: a second caller observing it fails
//! fast with `Busy` rather than queuing. The flag is also replicated to
//! siblings, giving a weak (advisory, not atomic) cross-process guard.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parley_bus::ConversationPatch;
use parley_core::types::{ChatTurn, StoredInteraction};
use parley_core::{ParleyError, SubscriptionTier, ToneId, UserId};
use parley_policy::{Cooldown, Standing};
use serde_json::{json, Value};
use tracing::debug;

pub struct Conversation {
    user_id: UserId,
    tier: SubscriptionTier,
    tone: ToneId,
    created_at: DateTime<Utc>,
    history: Vec<StoredInteraction>,
    /// False once the user has hard-reset; generations are refused until a
    /// new conversation replaces this replica.
    active: bool,
    /// Single-flight guard: a generation is in flight somewhere.
    locked: bool,
    cooldown: Cooldown,
    standing: Standing,
}

impl Conversation {
    pub fn new(user_id: UserId, tier: SubscriptionTier, tone: ToneId) -> Self {
        Self {
            user_id,
            tier,
            tone,
            created_at: Utc::now(),
            history: Vec::new(),
            active: true,
            locked: false,
            cooldown: Cooldown::new(),
            standing: Standing::new(),
        }
    }

    /// Rebuilds a replica from its persisted document. Fields absent from
    /// the document take new-conversation defaults; volatile state (lock,
    /// cooldown) always starts clear.
    pub fn from_document(
        user_id: UserId,
        tier: SubscriptionTier,
        default_tone: ToneId,
        doc: &Value,
    ) -> Self {
        let tone = doc
            .get("tone")
            .and_then(Value::as_str)
            .map(|s| ToneId(s.to_string()))
            .unwrap_or(default_tone);
        let active = doc.get("active").and_then(Value::as_bool).unwrap_or(true);
        let history = doc
            .get("history")
            .cloned()
            .and_then(|h| serde_json::from_value(h).ok())
            .unwrap_or_default();
        let created_at = doc
            .get("created")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        Self {
            user_id,
            tier,
            tone,
            created_at,
            history,
            active,
            locked: false,
            cooldown: Cooldown::new(),
            standing: Standing::new(),
        }
    }

    /// The persistable document: durable fields only, never the lock or
    /// cooldown.
    pub fn to_document(&self) -> Value {
        json!({
            "created": self.created_at.to_rfc3339(),
            "tone": self.tone.0,
            "active": self.active,
            "history": self.history,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn tier(&self) -> SubscriptionTier {
        self.tier
    }

    /// Tier is supplied by the transport on every call; entitlements can
    /// change between requests.
    pub fn set_tier(&mut self, tier: SubscriptionTier) {
        self.tier = tier;
    }

    pub fn tone(&self) -> &ToneId {
        &self.tone
    }

    pub fn history(&self) -> &[StoredInteraction] {
        &self.history
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn cooldown_active(&self) -> bool {
        self.cooldown.active()
    }

    pub fn standing(&self) -> &Standing {
        &self.standing
    }

    pub fn standing_mut(&mut self) -> &mut Standing {
        &mut self.standing
    }

    /// Prior exchanges flattened for prompt assembly, oldest first.
    pub fn turns(&self) -> Vec<ChatTurn> {
        self.history
            .iter()
            .map(|i| ChatTurn {
                user: i.input.text.clone(),
                assistant: i.output.text.clone(),
            })
            .collect()
    }

    /// Claims the single-flight lock for a generation.
    ///
    /// Gate order matters for observability: a banned or rate-limited user
    /// must not flip the lock even transiently.
    pub fn begin_generation(&mut self) -> Result<(), ParleyError> {
        if !self.active {
            return Err(ParleyError::InactiveConversation);
        }
        if self.locked {
            return Err(ParleyError::Busy);
        }
        if self.cooldown.active() {
            return Err(ParleyError::CooldownActive {
                remaining: self.cooldown.remaining(),
            });
        }
        self.locked = true;
        Ok(())
    }

    /// Records a successful generation: appends the interaction, releases
    /// the lock, and arms the cooldown.
    pub fn complete_generation(&mut self, interaction: StoredInteraction, cooldown: Duration) {
        self.history.push(interaction);
        self.locked = false;
        if !cooldown.is_zero() {
            self.cooldown.arm(cooldown);
        }
    }

    /// Releases the lock after a failed generation. No cooldown: a failure
    /// must not rate-limit the user's retry.
    pub fn abort_generation(&mut self) {
        self.locked = false;
    }

    /// Switches tone, wiping history (a tone change starts a new thread).
    /// Returns false when the tone is already selected; no-op, no wipe.
    pub fn change_tone(&mut self, tone: ToneId) -> bool {
        if self.tone == tone {
            return false;
        }
        debug!(user_id = %self.user_id, from = %self.tone, to = %tone, "tone changed");
        self.tone = tone;
        self.history.clear();
        true
    }

    /// Clears history. With `persist` the conversation stays active (a soft
    /// "start over"); without it the conversation is deactivated and its
    /// stored document is deleted by the manager.
    pub fn reset(&mut self, persist: bool) {
        self.history.clear();
        self.cooldown.cancel();
        if !persist {
            self.active = false;
        }
    }

    /// Shallow-merges a patch received from a sibling worker.
    pub fn apply_patch(&mut self, patch: ConversationPatch) {
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
        if let Some(active) = patch.active {
            self.active = active;
        }
        if let Some(tone) = patch.tone {
            self.tone = tone;
        }
        if let Some(history) = patch.history {
            self.history = history;
        }
        if let Some(interaction) = patch.append {
            self.history.push(interaction);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::types::{Completion, StoredInput, TokenUsage};

    fn interaction(id: &str, tone: &str) -> StoredInteraction {
        StoredInteraction {
            id: id.to_string(),
            requested_at: Utc::now().to_rfc3339(),
            completed_at: Utc::now().to_rfc3339(),
            input: StoredInput {
                text: "hello".to_string(),
                images: Vec::new(),
            },
            output: Completion {
                text: "hi there".to_string(),
                usage: TokenUsage::default(),
                stop_reason: None,
                verdict: None,
            },
            tone: ToneId(tone.to_string()),
        }
    }

    fn conversation() -> Conversation {
        Conversation::new(
            UserId("u1".into()),
            SubscriptionTier::Free,
            ToneId("aria".into()),
        )
    }

    #[test]
    fn begin_while_locked_is_busy() {
        let mut c = conversation();
        c.begin_generation().unwrap();
        assert!(matches!(c.begin_generation(), Err(ParleyError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn complete_arms_cooldown_and_unlocks() {
        let mut c = conversation();
        c.begin_generation().unwrap();
        c.complete_generation(interaction("i1", "aria"), Duration::from_secs(60));
        assert!(!c.is_locked());
        assert_eq!(c.history().len(), 1);
        assert!(matches!(
            c.begin_generation(),
            Err(ParleyError::CooldownActive { .. })
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        c.begin_generation().unwrap();
    }

    #[test]
    fn abort_unlocks_without_cooldown() {
        let mut c = conversation();
        c.begin_generation().unwrap();
        c.abort_generation();
        assert!(!c.is_locked());
        // Immediately retryable.
        c.begin_generation().unwrap();
    }

    #[test]
    fn change_tone_wipes_history() {
        let mut c = conversation();
        c.complete_generation(interaction("i1", "aria"), Duration::ZERO);
        assert!(c.change_tone(ToneId("sage".into())));
        assert_eq!(c.tone().0, "sage");
        assert!(c.history().is_empty());
    }

    #[test]
    fn change_to_same_tone_is_a_noop() {
        let mut c = conversation();
        c.complete_generation(interaction("i1", "aria"), Duration::ZERO);
        assert!(!c.change_tone(ToneId("aria".into())));
        assert_eq!(c.history().len(), 1);
    }

    #[test]
    fn soft_reset_keeps_conversation_active() {
        let mut c = conversation();
        c.complete_generation(interaction("i1", "aria"), Duration::ZERO);
        c.reset(true);
        assert!(c.is_active());
        assert!(c.history().is_empty());
        c.begin_generation().unwrap();
    }

    #[test]
    fn hard_reset_deactivates() {
        let mut c = conversation();
        c.reset(false);
        assert!(!c.is_active());
        assert!(matches!(
            c.begin_generation(),
            Err(ParleyError::InactiveConversation)
        ));
    }

    #[test]
    fn document_round_trip() {
        let mut c = conversation();
        c.complete_generation(interaction("i1", "aria"), Duration::ZERO);
        c.change_tone(ToneId("sage".into()));
        c.complete_generation(interaction("i2", "sage"), Duration::ZERO);

        let doc = c.to_document();
        let restored = Conversation::from_document(
            UserId("u1".into()),
            SubscriptionTier::Free,
            ToneId("aria".into()),
            &doc,
        );
        assert_eq!(restored.tone().0, "sage");
        assert!(restored.is_active());
        assert_eq!(restored.history().len(), 1);
        assert_eq!(restored.history()[0].id, "i2");
        // Volatile state never round-trips.
        assert!(!restored.is_locked());
        assert!(!restored.cooldown_active());
    }

    #[test]
    fn patch_application_is_shallow() {
        let mut c = conversation();
        c.apply_patch(ConversationPatch {
            locked: Some(true),
            ..Default::default()
        });
        assert!(c.is_locked());
        assert!(c.is_active());

        c.apply_patch(ConversationPatch {
            locked: Some(false),
            append: Some(interaction("i1", "aria")),
            ..Default::default()
        });
        assert!(!c.is_locked());
        assert_eq!(c.history().len(), 1);

        c.apply_patch(ConversationPatch {
            tone: Some(ToneId("sage".into())),
            history: Some(Vec::new()),
            ..Default::default()
        });
        assert_eq!(c.tone().0, "sage");
        assert!(c.history().is_empty());
    }

    #[test]
    fn banned_standing_blocks_via_policy() {
        let mut c = conversation();
        c.standing_mut().ban();
        assert!(c.standing().ensure_allowed().is_err());
    }
}
