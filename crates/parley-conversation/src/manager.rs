// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-worker conversation manager.
//!
//! Owns the local replica map, gates every generation through the policy
//! layer (standing, tone entitlement, cooldown, single-flight lock), drives
//! the retry engine against the session pool, and keeps siblings loosely
//! consistent over the replication bus. Replicas idle past the TTL are
//! evicted and reloaded from the cache/store on next touch.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parley_bus::{ConversationPatch, Envelope, ReplicaEvent, ReplicationBus, WorkerId};
use parley_cache::WriteBehind;
use parley_config::ParleyConfig;
use parley_core::types::{
    ChatInteraction, Collection, ModerationContext, PromptContext, PromptInput,
};
use parley_core::{DocumentStore, Moderator, ParleyError, ProgressSink, SubscriptionTier, ToneId, UserId};
use parley_policy::{effective_cooldown, ToneCatalog};
use parley_session::SessionPool;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conversation::Conversation;
use crate::retry;

struct Entry {
    conversation: Arc<Mutex<Conversation>>,
    last_used: tokio::time::Instant,
}

/// A finished generation handed back to the transport.
#[derive(Debug)]
pub struct GenerationReceipt {
    pub interaction: ChatInteraction,
    /// Failed attempts before the successful one.
    pub tries: u32,
}

pub struct ConversationManager {
    worker: WorkerId,
    config: ParleyConfig,
    catalog: ToneCatalog,
    pool: Arc<SessionPool>,
    cache: Arc<WriteBehind>,
    store: Arc<dyn DocumentStore>,
    moderator: Option<Arc<dyn Moderator>>,
    bus: ReplicationBus,
    entries: Mutex<HashMap<UserId, Entry>>,
}

impl ConversationManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker: WorkerId,
        config: ParleyConfig,
        catalog: ToneCatalog,
        pool: Arc<SessionPool>,
        cache: Arc<WriteBehind>,
        store: Arc<dyn DocumentStore>,
        bus: ReplicationBus,
    ) -> Self {
        Self {
            worker,
            config,
            catalog,
            pool,
            cache,
            store,
            moderator: None,
            bus,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_moderator(mut self, moderator: Arc<dyn Moderator>) -> Self {
        self.moderator = Some(moderator);
        self
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker
    }

    /// Number of replicas currently resident in this worker.
    pub async fn loaded(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Returns the user's replica, loading it from the cache/store or
    /// creating a fresh conversation when none exists anywhere.
    pub async fn get_or_load(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
    ) -> Result<Arc<Mutex<Conversation>>, ParleyError> {
        {
            let mut entries = self.entries.lock().await;
            if let Some(entry) = entries.get_mut(user_id) {
                entry.last_used = tokio::time::Instant::now();
                let conversation = entry.conversation.clone();
                drop(entries);
                conversation.lock().await.set_tier(tier);
                return Ok(conversation);
            }
        }

        // Loading hits the store; do it outside the map lock.
        let default_tone = self.catalog.default_tone().id.clone();
        let conversation = match self
            .cache
            .fetch(Collection::Conversations, &user_id.0)
            .await?
        {
            Some(doc) => {
                debug!(user_id = %user_id, "conversation loaded from store");
                Conversation::from_document(user_id.clone(), tier, default_tone, &doc)
            }
            None => {
                debug!(user_id = %user_id, "new conversation created");
                Conversation::new(user_id.clone(), tier, default_tone)
            }
        };

        let mut entries = self.entries.lock().await;
        // A racing loader may have inserted meanwhile; keep the winner.
        let entry = entries.entry(user_id.clone()).or_insert_with(|| Entry {
            conversation: Arc::new(Mutex::new(conversation)),
            last_used: tokio::time::Instant::now(),
        });
        entry.last_used = tokio::time::Instant::now();
        Ok(entry.conversation.clone())
    }

    /// Runs one generation for a user, end to end.
    ///
    /// Policy gates fire in order — standing, tone entitlement, cooldown,
    /// single-flight lock — before any session is touched; a rejected
    /// request never consumes a session, arms no cooldown, and leaves the
    /// conversation unlocked. The entry mutex is held only for the state
    /// transitions, never across the backend call, so a concurrent caller
    /// observes `Busy` immediately instead of queuing.
    pub async fn generate(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        input: PromptInput,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationReceipt, ParleyError> {
        let handle = self.get_or_load(user_id, tier).await?;
        let requested_at = Utc::now();

        // Gate and claim the lock.
        let (tone, model, turns) = {
            let mut conversation = handle.lock().await;
            conversation.standing().ensure_allowed()?;
            let tone = conversation.tone().clone();
            self.catalog.ensure_allowed(&tone, tier)?;
            let model = self.catalog.resolve(&tone)?.model.clone();
            conversation.begin_generation()?;
            (tone, model, conversation.turns())
        };
        self.publish_patch(
            user_id,
            ConversationPatch {
                locked: Some(true),
                ..Default::default()
            },
        );

        let ctx = PromptContext {
            user_id: user_id.clone(),
            model,
            turns,
            prompt: input.clone(),
        };
        let outcome = retry::run_generation(&self.pool, &self.config.retry, ctx, progress).await;

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                // Unlock without arming a cooldown; the user may retry now.
                handle.lock().await.abort_generation();
                self.publish_patch(
                    user_id,
                    ConversationPatch {
                        locked: Some(false),
                        ..Default::default()
                    },
                );
                return Err(e);
            }
        };

        let mut completion = outcome.completion;
        if let Some(moderator) = &self.moderator {
            let context = ModerationContext {
                user_id: user_id.clone(),
                tone: tone.clone(),
            };
            match moderator.check(&completion.text, &context).await {
                Ok(verdict) => completion.verdict = Some(verdict),
                // Moderation outages never fail a generation.
                Err(e) => warn!(user_id = %user_id, error = %e, "moderation check failed"),
            }
        }

        let interaction = ChatInteraction {
            id: Uuid::new_v4().to_string(),
            input,
            output: completion,
            trigger: None,
            reply: None,
            requested_at,
            completed_at: Utc::now(),
        };
        let stored = interaction.stripped(&tone);

        let (cooldown, doc) = {
            let mut conversation = handle.lock().await;
            let cooldown = effective_cooldown(
                &self.config.cooldown,
                tier,
                self.catalog.resolve(&tone)?,
            );
            conversation.complete_generation(stored.clone(), cooldown);
            let doc = conversation.to_document();
            self.cache
                .set_cache(Collection::Conversations, &user_id.0, doc.clone());
            (cooldown, doc)
        };

        // Stage persistence; the write-behind queue owns durability from
        // here, including retry on store failure.
        self.cache
            .add_to_queue(Collection::Conversations, &user_id.0, doc);
        // The generation already completed; a bad audit row must not turn it
        // into an error, and the unlock patch below must always go out.
        match serde_json::to_value(&stored) {
            Ok(row) => self.cache.add_to_queue(Collection::Interactions, &stored.id, row),
            Err(e) => warn!(user_id = %user_id, error = %e, "interaction row not staged"),
        }
        self.publish_patch(
            user_id,
            ConversationPatch {
                locked: Some(false),
                append: Some(stored),
                ..Default::default()
            },
        );

        info!(
            user_id = %user_id,
            tone = %tone,
            tries = outcome.tries,
            cooldown_ms = cooldown.as_millis() as u64,
            "generation complete"
        );
        Ok(GenerationReceipt {
            interaction,
            tries: outcome.tries,
        })
    }

    /// Switches the user's tone. A change wipes history (new thread); asking
    /// for the already-selected tone is a no-op that wipes nothing.
    pub async fn change_tone(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        tone: ToneId,
    ) -> Result<bool, ParleyError> {
        self.catalog.ensure_allowed(&tone, tier)?;
        let handle = self.get_or_load(user_id, tier).await?;

        let changed = {
            let mut conversation = handle.lock().await;
            if conversation.is_locked() {
                return Err(ParleyError::Busy);
            }
            let changed = conversation.change_tone(tone.clone());
            if changed {
                self.cache.set_cache(
                    Collection::Conversations,
                    &user_id.0,
                    conversation.to_document(),
                );
            }
            changed
        };

        if changed {
            self.cache.add_to_queue(
                Collection::Conversations,
                &user_id.0,
                json!({ "tone": tone.0, "history": [] }),
            );
            self.publish_patch(
                user_id,
                ConversationPatch {
                    tone: Some(tone),
                    history: Some(Vec::new()),
                    ..Default::default()
                },
            );
        }
        Ok(changed)
    }

    /// Resets a conversation. `persist == true` wipes history but keeps the
    /// conversation (and its stored row) alive; `persist == false` is a hard
    /// delete — the stored document is removed and no later flush may
    /// resurrect it.
    pub async fn reset(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        persist: bool,
    ) -> Result<(), ParleyError> {
        let handle = self.get_or_load(user_id, tier).await?;
        {
            let mut conversation = handle.lock().await;
            if conversation.is_locked() {
                return Err(ParleyError::Busy);
            }
            conversation.reset(persist);
        }

        if persist {
            self.cache.add_to_queue(
                Collection::Conversations,
                &user_id.0,
                json!({ "history": [] }),
            );
            let doc = handle.lock().await.to_document();
            self.cache
                .set_cache(Collection::Conversations, &user_id.0, doc);
            self.publish_patch(
                user_id,
                ConversationPatch {
                    history: Some(Vec::new()),
                    ..Default::default()
                },
            );
        } else {
            self.cache.purge(Collection::Conversations, &user_id.0);
            self.store
                .delete(Collection::Conversations, &user_id.0)
                .await?;
            // Drop the local replica so the user's next message starts a
            // fresh conversation. Siblings deactivate theirs until eviction.
            self.entries.lock().await.remove(user_id);
            self.publish_patch(
                user_id,
                ConversationPatch {
                    active: Some(false),
                    history: Some(Vec::new()),
                    ..Default::default()
                },
            );
            info!(user_id = %user_id, "conversation hard-reset");
        }
        Ok(())
    }

    /// Administrative ban toggle on the user's standing.
    pub async fn set_banned(
        &self,
        user_id: &UserId,
        tier: SubscriptionTier,
        banned: bool,
    ) -> Result<(), ParleyError> {
        let handle = self.get_or_load(user_id, tier).await?;
        let mut conversation = handle.lock().await;
        if banned {
            conversation.standing_mut().ban();
        } else {
            conversation.standing_mut().unban();
        }
        Ok(())
    }

    fn publish_patch(&self, user_id: &UserId, patch: ConversationPatch) {
        if patch.is_empty() {
            return;
        }
        self.bus.publish(
            self.worker,
            ReplicaEvent::Conversation {
                user_id: user_id.clone(),
                patch,
            },
        );
    }

    /// Applies one replication envelope to local state. Own events and
    /// events for users with no resident replica are skipped; an evicted
    /// replica reloads fresh state from the store anyway.
    pub async fn apply_envelope(&self, envelope: Envelope) {
        if envelope.origin == self.worker {
            return;
        }
        let ReplicaEvent::Conversation { user_id, patch } = envelope.event else {
            return;
        };

        let handle = {
            let mut entries = self.entries.lock().await;
            match entries.get_mut(&user_id) {
                Some(entry) => {
                    // A replicated mutation counts as activity for the TTL.
                    entry.last_used = tokio::time::Instant::now();
                    entry.conversation.clone()
                }
                None => return,
            }
        };
        handle.lock().await.apply_patch(patch);
        debug!(user_id = %user_id, origin = %envelope.origin, "sibling patch applied");
    }

    /// Evicts replicas idle past the TTL, dropping their cache entries with
    /// them so resident memory tracks active conversations. Locked
    /// conversations are never evicted, whatever their age, and neither are
    /// conversations with an unflushed queued update — a cold reload after
    /// such an eviction would read the store's stale copy.
    pub async fn sweep_idle(&self) -> usize {
        let ttl = Duration::from_secs(self.config.conversation.idle_ttl_secs);
        let now = tokio::time::Instant::now();
        let mut evicted = 0;

        let mut entries = self.entries.lock().await;
        let mut keep = HashMap::new();
        for (user_id, entry) in entries.drain() {
            let expired = now.duration_since(entry.last_used) >= ttl;
            let locked = match entry.conversation.try_lock() {
                Ok(conversation) => conversation.is_locked(),
                // Mutex contention means someone is using it right now.
                Err(_) => true,
            };
            let pending = self
                .cache
                .peek_queue(Collection::Conversations, &user_id.0)
                .is_some();
            if expired && !locked && !pending {
                self.cache.invalidate(Collection::Conversations, &user_id.0);
                evicted += 1;
                debug!(user_id = %user_id, "idle conversation evicted");
            } else {
                keep.insert(user_id, entry);
            }
        }
        *entries = keep;
        evicted
    }
}

/// Replication listener: applies sibling conversation patches until
/// cancelled. Lag drops are tolerated by contract.
pub async fn run_replication(
    manager: Arc<ConversationManager>,
    cancel: CancellationToken,
) {
    let mut rx = manager.bus.subscribe();
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(envelope) => manager.apply_envelope(envelope).await,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "conversation replication lagged, events dropped");
                }
                Err(RecvError::Closed) => return,
            },
            _ = cancel.cancelled() => return,
        }
    }
}

/// Periodic idle-eviction sweep until cancelled.
pub async fn run_eviction(
    manager: Arc<ConversationManager>,
    cancel: CancellationToken,
) {
    let interval = Duration::from_secs(manager.config.conversation.sweep_interval_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = manager.sweep_idle().await;
                if evicted > 0 {
                    info!(evicted, "idle conversations evicted");
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
