// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background loops around [`WriteBehind`]: the periodic flush and the
//! replication listener that applies sibling cache updates.

use std::sync::Arc;
use std::time::Duration;

use parley_bus::{ReplicaEvent, ReplicationBus, WorkerId};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::WriteBehind;

/// Spawns [`run_flush_loop`] on the current runtime.
pub fn spawn_flush_task(
    cache: Arc<WriteBehind>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_flush_loop(cache, interval, cancel))
}

/// Runs the flush loop until cancelled, then performs one final flush so
/// shutdown never strands queued updates.
pub async fn run_flush_loop(
    cache: Arc<WriteBehind>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; skip it so the loop flushes on the
    // configured cadence.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                cache.flush().await;
            }
            _ = cancel.cancelled() => {
                info!("flush loop stopping, draining queue");
                let report = cache.flush().await;
                if report.failed > 0 {
                    warn!(failed = report.failed, "updates still queued at shutdown");
                }
                return;
            }
        }
    }
}

/// Applies `CacheSet` and `CachePurge` events from sibling workers to the
/// local cache. Events originating from `own` are skipped. Lag drops are
/// tolerated; replication is best-effort by design.
pub async fn run_cache_replication(
    cache: Arc<WriteBehind>,
    bus: ReplicationBus,
    own: WorkerId,
    cancel: CancellationToken,
) {
    let mut rx = bus.subscribe();
    loop {
        tokio::select! {
            received = rx.recv() => {
                match received {
                    Ok(envelope) => {
                        if envelope.origin == own {
                            continue;
                        }
                        match envelope.event {
                            ReplicaEvent::CacheSet { collection, key, value } => {
                                cache.apply_remote_set(collection, &key, value);
                            }
                            ReplicaEvent::CachePurge { collection, key } => {
                                cache.apply_remote_purge(collection, &key);
                            }
                            _ => {}
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "cache replication lagged, events dropped");
                    }
                    Err(RecvError::Closed) => {
                        debug!("replication bus closed, cache listener stopping");
                        return;
                    }
                }
            }
            _ = cancel.cancelled() => return,
        }
    }
}
