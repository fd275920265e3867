// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed replication bus between sibling worker processes.
//!
//! One worker applies a mutation locally, then publishes it here; every
//! sibling holding a replica of the same logical conversation shallow-merges
//! the patch. Delivery is best-effort, unordered, and unacknowledged — a
//! sibling that misses an event serves stale state until its own next
//! mutation or a TTL-based reload from the backing store.
//!
//! Built on `tokio::sync::broadcast`. Envelopes carry the origin worker id so
//! receivers can skip their own events; in production each worker process has
//! its own id, and in tests several managers share one bus with distinct ids
//! to simulate siblings.

use parley_core::types::{Collection, StoredInteraction};
use parley_core::{ToneId, UserId};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Identity of one worker process on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub uuid::Uuid);

impl WorkerId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Partial conversation state, shallow-merged into a sibling's replica.
///
/// `None` fields are untouched. Same-field races resolve last-write-wins by
/// arrival order, which is not guaranteed to match causal order.
#[derive(Debug, Clone, Default)]
pub struct ConversationPatch {
    pub locked: Option<bool>,
    pub active: Option<bool>,
    pub tone: Option<ToneId>,
    /// Full history replacement (reset, tone change).
    pub history: Option<Vec<StoredInteraction>>,
    /// One interaction appended to the history.
    pub append: Option<StoredInteraction>,
}

impl ConversationPatch {
    pub fn is_empty(&self) -> bool {
        self.locked.is_none()
            && self.active.is_none()
            && self.tone.is_none()
            && self.history.is_none()
            && self.append.is_none()
    }
}

/// An event fanned out to sibling workers.
#[derive(Debug, Clone)]
pub enum ReplicaEvent {
    /// A conversation mutation to shallow-merge into local replicas.
    Conversation {
        user_id: UserId,
        patch: ConversationPatch,
    },
    /// A read-through cache entry updated on the origin worker.
    CacheSet {
        collection: Collection,
        key: String,
        value: Value,
    },
    /// A hard delete on the origin worker. Receivers drop both their cache
    /// entry and any pending queued update, so no sibling flush can
    /// resurrect the deleted document.
    CachePurge { collection: Collection, key: String },
}

/// A bus message with its origin worker.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: WorkerId,
    pub event: ReplicaEvent,
}

/// The broadcast fan-out shared by all workers.
#[derive(Debug, Clone)]
pub struct ReplicationBus {
    tx: broadcast::Sender<Envelope>,
}

impl ReplicationBus {
    /// Creates a bus buffering up to `capacity` undelivered events per
    /// receiver. Slow receivers past the buffer lose events, which the
    /// replication contract tolerates.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publishes an event. Fire-and-forget: having no sibling receivers is
    /// not an error.
    pub fn publish(&self, origin: WorkerId, event: ReplicaEvent) {
        if self.tx.send(Envelope { origin, event }).is_err() {
            trace!(worker = %origin, "no sibling receivers on replication bus");
        }
    }

    /// Subscribes a worker to the fan-out. The receiver sees every event
    /// published after this call, including its own (filter by origin).
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}

impl Default for ReplicationBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_all_subscribers() {
        let bus = ReplicationBus::new(16);
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();
        let origin = WorkerId::generate();

        bus.publish(
            origin,
            ReplicaEvent::Conversation {
                user_id: UserId("u1".into()),
                patch: ConversationPatch {
                    locked: Some(true),
                    ..Default::default()
                },
            },
        );

        for rx in [&mut rx_a, &mut rx_b] {
            let env = rx.recv().await.unwrap();
            assert_eq!(env.origin, origin);
            match env.event {
                ReplicaEvent::Conversation { user_id, patch } => {
                    assert_eq!(user_id.0, "u1");
                    assert_eq!(patch.locked, Some(true));
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_receivers_is_not_an_error() {
        let bus = ReplicationBus::new(16);
        bus.publish(
            WorkerId::generate(),
            ReplicaEvent::CacheSet {
                collection: Collection::Conversations,
                key: "u1".into(),
                value: serde_json::json!({"active": true}),
            },
        );
    }

    #[tokio::test]
    async fn origin_tagging_distinguishes_workers() {
        let bus = ReplicationBus::new(16);
        let mut rx = bus.subscribe();
        let me = WorkerId::generate();
        let sibling = WorkerId::generate();

        bus.publish(
            me,
            ReplicaEvent::Conversation {
                user_id: UserId("u1".into()),
                patch: ConversationPatch::default(),
            },
        );
        bus.publish(
            sibling,
            ReplicaEvent::Conversation {
                user_id: UserId("u1".into()),
                patch: ConversationPatch::default(),
            },
        );

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.origin, me);
        assert_eq!(second.origin, sibling);
        assert_ne!(first.origin, second.origin);
    }

    #[test]
    fn empty_patch_detection() {
        assert!(ConversationPatch::default().is_empty());
        let patch = ConversationPatch {
            active: Some(false),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
