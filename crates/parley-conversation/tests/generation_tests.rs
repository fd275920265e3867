// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end generation behavior through the full manager stack.

use std::sync::Arc;
use std::time::Duration;

use parley_core::error::BackendError;
use parley_core::types::{Collection, PromptInput};
use parley_core::{ParleyError, SubscriptionTier, ToneId, UserId};
use parley_test_utils::{MockModerator, RecordingProgress, TestHarness};

fn user(id: &str) -> UserId {
    UserId(id.to_string())
}

fn prompt(text: &str) -> PromptInput {
    PromptInput::text(text)
}

#[tokio::test]
async fn successful_generation_returns_interaction() {
    let h = TestHarness::builder().build().await;
    let progress = RecordingProgress::new();

    let receipt = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hello"), &progress)
        .await
        .unwrap();

    assert_eq!(receipt.interaction.output.text, "mock reply");
    assert_eq!(receipt.interaction.input.text, "hello");
    assert_eq!(receipt.tries, 0);
    assert_eq!(progress.count(), 0);
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn history_accumulates_across_turns() {
    let h = TestHarness::builder().build().await;
    let progress = RecordingProgress::new();
    let u = user("u1");

    h.backend.push_ok("first");
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &progress)
        .await
        .unwrap();
    h.backend.push_ok("second");
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &progress)
        .await
        .unwrap();

    // The second call carried the first exchange as context.
    let contexts = h.backend.contexts();
    assert_eq!(contexts[0].turns.len(), 0);
    assert_eq!(contexts[1].turns.len(), 1);
    assert_eq!(contexts[1].turns[0].user, "one");
    assert_eq!(contexts[1].turns[0].assistant, "first");
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_progress_notices() {
    let h = TestHarness::builder().build().await;
    let progress = RecordingProgress::new();

    h.backend
        .push_errs(BackendError::Network("connection reset".into()), 4);
    h.backend.push_ok("finally");

    let receipt = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &progress)
        .await
        .unwrap();

    assert_eq!(receipt.interaction.output.text, "finally");
    assert_eq!(receipt.tries, 4);
    // Four failed attempts, four user-visible notices, 1-based numbering.
    assert_eq!(progress.count(), 4);
    let attempts: Vec<u32> = progress.notices().iter().map(|(a, _)| *a).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4]);
    assert_eq!(h.backend.call_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn backoff_delays_grow_linearly() {
    let h = TestHarness::builder()
        .configure(|c| c.retry.backoff_step_ms = 1_000)
        .build()
        .await;
    let progress = RecordingProgress::new();

    h.backend
        .push_errs(BackendError::Network("reset".into()), 3);

    h.manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &progress)
        .await
        .unwrap();

    let delays: Vec<Duration> = progress.notices().iter().map(|(_, d)| *d).collect();
    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_fail_and_unlock() {
    let h = TestHarness::builder()
        .configure(|c| c.retry.max_attempts = 3)
        .build()
        .await;
    let progress = RecordingProgress::new();
    let u = user("u1");

    h.backend
        .push_errs(BackendError::Network("reset".into()), 3);

    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &progress)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ParleyError::GenerationFailed { attempts: 3, .. }
    ));

    // Failure leaves no lock and arms no cooldown; an immediate retry works.
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("again"), &progress)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrent_generation_fails_fast_with_busy() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    // Preload the replica so both callers share one conversation.
    h.manager.get_or_load(&u, SubscriptionTier::Free).await.unwrap();
    h.backend.set_delay(Duration::from_secs(10));

    let manager = h.manager.clone();
    let first = {
        let u = u.clone();
        tokio::spawn(async move {
            manager
                .generate(
                    &u,
                    SubscriptionTier::Free,
                    prompt("slow"),
                    &parley_core::NoProgress,
                )
                .await
        })
    };
    // Let the first generation claim the lock and park in the backend.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let err = h
        .manager
        .generate(
            &u,
            SubscriptionTier::Free,
            prompt("eager"),
            &parley_core::NoProgress,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::Busy));

    first.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn cooldown_blocks_until_elapsed() {
    let h = TestHarness::builder()
        .configure(|c| c.cooldown.base_ms = 60_000)
        .build()
        .await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();

    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::CooldownActive { .. }));
    // The rejected request never reached the backend.
    assert_eq!(h.backend.call_count(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("three"), &parley_core::NoProgress)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn premium_tier_cools_down_faster_than_free() {
    let h = TestHarness::builder()
        .configure(|c| c.cooldown.base_ms = 60_000)
        .build()
        .await;

    // UserPremium multiplier is 0.1: 6s instead of 60s.
    h.manager
        .generate(
            &user("p1"),
            SubscriptionTier::UserPremium,
            prompt("one"),
            &parley_core::NoProgress,
        )
        .await
        .unwrap();
    tokio::time::advance(Duration::from_secs(7)).await;
    h.manager
        .generate(
            &user("p1"),
            SubscriptionTier::UserPremium,
            prompt("two"),
            &parley_core::NoProgress,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn restricted_tone_rejects_before_any_session_work() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    // Premium user selects the premium tone, then their entitlement lapses.
    h.manager
        .change_tone(&u, SubscriptionTier::UserPremium, ToneId("sage".into()))
        .await
        .unwrap();

    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::ToneRestricted { .. }));
    // No backend call, no lock, no cooldown: a premium upgrade fixes it.
    assert_eq!(h.backend.call_count(), 0);
    h.manager
        .generate(
            &u,
            SubscriptionTier::UserPremium,
            prompt("hi"),
            &parley_core::NoProgress,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn premium_tone_selection_requires_entitlement() {
    let h = TestHarness::builder().build().await;
    let err = h
        .manager
        .change_tone(&user("u1"), SubscriptionTier::Free, ToneId("sage".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::ToneRestricted { .. }));
}

#[tokio::test]
async fn banned_user_is_refused() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .set_banned(&u, SubscriptionTier::Free, true)
        .await
        .unwrap();
    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::UserBanned));
    assert_eq!(h.backend.call_count(), 0);

    h.manager
        .set_banned(&u, SubscriptionTier::Free, false)
        .await
        .unwrap();
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap();
}

#[tokio::test]
async fn generation_is_persisted_via_the_queue() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    let receipt = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hello"), &parley_core::NoProgress)
        .await
        .unwrap();

    // Nothing durable until a flush cycle runs.
    assert!(h.store.document(Collection::Conversations, "u1").is_none());
    h.cache.flush().await;

    let doc = h.store.document(Collection::Conversations, "u1").unwrap();
    assert_eq!(doc["history"].as_array().unwrap().len(), 1);
    assert_eq!(doc["active"], serde_json::json!(true));
    assert!(doc["created"].is_string());
    // The interaction row persists independently of the conversation.
    let row = h
        .store
        .document(Collection::Interactions, &receipt.interaction.id)
        .unwrap();
    assert_eq!(row["output"]["text"], serde_json::json!("mock reply"));
}

#[tokio::test]
async fn store_outage_defers_persistence_without_losing_it() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.store.fail_key("u1");
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("hello"), &parley_core::NoProgress)
        .await
        .unwrap();

    let report = h.cache.flush().await;
    assert_eq!(report.failed, 1);
    assert!(h.store.document(Collection::Conversations, "u1").is_none());

    h.store.heal_key("u1");
    let report = h.cache.flush().await;
    assert_eq!(report.failed, 0);
    assert!(h.store.document(Collection::Conversations, "u1").is_some());
}

#[tokio::test]
async fn tone_change_wipes_history_and_reroutes_model() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::UserPremium, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    let changed = h
        .manager
        .change_tone(&u, SubscriptionTier::UserPremium, ToneId("sage".into()))
        .await
        .unwrap();
    assert!(changed);

    h.manager
        .generate(&u, SubscriptionTier::UserPremium, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap();

    let contexts = h.backend.contexts();
    // History was wiped by the tone change.
    assert_eq!(contexts[1].turns.len(), 0);
    // The new tone routes to its own model.
    assert_eq!(contexts[0].model, "aria-4");
    assert_eq!(contexts[1].model, "sage-xl");
}

#[tokio::test]
async fn same_tone_change_is_a_noop() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    let changed = h
        .manager
        .change_tone(&u, SubscriptionTier::Free, ToneId("aria".into()))
        .await
        .unwrap();
    assert!(!changed);

    // History untouched.
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert_eq!(h.backend.contexts()[1].turns.len(), 1);
}

#[tokio::test]
async fn soft_reset_clears_history_keeps_conversation() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    h.manager.reset(&u, SubscriptionTier::Free, true).await.unwrap();

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert_eq!(h.backend.contexts()[1].turns.len(), 0);

    h.cache.flush().await;
    let doc = h.store.document(Collection::Conversations, "u1").unwrap();
    assert_eq!(doc["history"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn hard_reset_deletes_and_starts_fresh() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    h.cache.flush().await;
    assert!(h.store.document(Collection::Conversations, "u1").is_some());

    h.manager.reset(&u, SubscriptionTier::Free, false).await.unwrap();
    assert!(h.store.document(Collection::Conversations, "u1").is_none());
    // A later flush must not resurrect the deleted row.
    h.cache.flush().await;
    assert!(h.store.document(Collection::Conversations, "u1").is_none());

    // The next message opens a brand-new conversation.
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert_eq!(h.backend.contexts()[1].turns.len(), 0);
}

#[tokio::test]
async fn cold_worker_loads_conversation_from_store() {
    let h = TestHarness::builder().build().await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    h.cache.flush().await;

    // A sibling worker with a cold cache reloads the persisted state.
    let sibling = h.sibling().await;
    sibling
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("two"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert_eq!(sibling.backend.contexts()[0].turns.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn idle_replicas_are_evicted_but_locked_ones_survive() {
    let h = TestHarness::builder()
        .configure(|c| c.conversation.idle_ttl_secs = 60)
        .build()
        .await;

    let idle = h
        .manager
        .get_or_load(&user("idle"), SubscriptionTier::Free)
        .await
        .unwrap();
    let busy = h
        .manager
        .get_or_load(&user("busy"), SubscriptionTier::Free)
        .await
        .unwrap();
    busy.lock().await.begin_generation().unwrap();
    drop(idle);

    tokio::time::advance(Duration::from_secs(61)).await;
    let evicted = h.manager.sweep_idle().await;
    assert_eq!(evicted, 1);
    assert_eq!(h.manager.loaded().await, 1);
}

#[tokio::test(start_paused = true)]
async fn eviction_drops_the_cache_entry_too() {
    let h = TestHarness::builder()
        .configure(|c| c.conversation.idle_ttl_secs = 60)
        .build()
        .await;
    let u = user("u1");

    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("one"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert!(h.cache.peek_cache(Collection::Conversations, "u1").is_some());

    tokio::time::advance(Duration::from_secs(61)).await;
    // An unflushed update pins the replica; evicting now would let a cold
    // reload see the store's stale copy.
    assert_eq!(h.manager.sweep_idle().await, 0);

    h.cache.flush().await;
    assert_eq!(h.manager.sweep_idle().await, 1);
    assert_eq!(h.manager.loaded().await, 0);
    // The cache entry went with the replica, so memory stays bounded to
    // active conversations.
    assert!(h.cache.peek_cache(Collection::Conversations, "u1").is_none());
}

#[tokio::test]
async fn moderation_verdict_is_attached() {
    let h = TestHarness::builder()
        .moderator(Arc::new(MockModerator::new().flagging(&["reply"])))
        .build()
        .await;

    let receipt = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert!(receipt.interaction.output.verdict.unwrap().flagged);
}

#[tokio::test]
async fn moderation_outage_does_not_fail_generation() {
    let h = TestHarness::builder()
        .moderator(Arc::new(MockModerator::new().failing()))
        .build()
        .await;

    let receipt = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap();
    assert!(receipt.interaction.output.verdict.is_none());
}

#[tokio::test]
async fn empty_completion_is_terminal() {
    let h = TestHarness::builder().build().await;
    h.backend.push_ok("   ");

    let err = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::EmptyCompletion));
    // Terminal: exactly one attempt.
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn prompt_too_long_is_terminal() {
    let h = TestHarness::builder().build().await;
    h.backend.push_err(BackendError::PromptTooLong);

    let err = h
        .manager
        .generate(&user("u1"), SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::PromptTooLong));
    assert_eq!(h.backend.call_count(), 1);
}

#[tokio::test]
async fn session_fatal_error_aborts_without_looping() {
    let h = TestHarness::builder()
        .configure(|c| c.pool.size = 3)
        .build()
        .await;
    let u = user("u1");

    h.backend.push_err(BackendError::QuotaExhausted);
    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::SessionUnusable { .. }));
    // One attempt only; the session is gone for good.
    assert_eq!(h.backend.call_count(), 1);
    assert_eq!(h.pool.serviceable().await, 2);

    // The failure unlocked the conversation; remaining sessions serve it.
    h.manager
        .generate(&u, SubscriptionTier::Free, prompt("again"), &parley_core::NoProgress)
        .await
        .unwrap();
}

#[tokio::test]
async fn pool_exhaustion_surfaces_no_free_sessions() {
    let h = TestHarness::builder()
        .configure(|c| c.pool.size = 1)
        .build()
        .await;
    let u = user("u1");

    // Burn the only session.
    h.backend.push_err(BackendError::CredentialsRevoked);
    let _ = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("hi"), &parley_core::NoProgress)
        .await
        .unwrap_err();

    let err = h
        .manager
        .generate(&u, SubscriptionTier::Free, prompt("again"), &parley_core::NoProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::NoFreeSessions));
}
