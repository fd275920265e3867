// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-size session pool with bounded, fail-fast acquisition.
//!
//! The pool never queues callers: `acquire` scans for a `Ready` session that
//! serves the requested model, optionally polling up to a configured
//! deadline, and otherwise fails with `NoFreeSessions`. The caller (the
//! retry engine) surfaces that as a busy condition instead of holding a
//! user's request hostage behind an unbounded wait.

use std::sync::Arc;
use std::time::Duration;

use parley_config::PoolConfig;
use parley_core::error::BackendError;
use parley_core::traits::ModelBackend;
use parley_core::ParleyError;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::session::{Session, SessionState};

/// Exclusive use of one pooled session. Must be returned via
/// [`SessionPool::release`] or [`SessionPool::fail`].
#[must_use = "leases must be released or failed back to the pool"]
pub struct SessionLease {
    session_id: Uuid,
    slot: Arc<Mutex<Session>>,
    backend: Arc<dyn ModelBackend>,
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

impl SessionLease {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn backend(&self) -> &Arc<dyn ModelBackend> {
        &self.backend
    }
}

pub struct SessionPool {
    slots: Vec<Arc<Mutex<Session>>>,
    config: PoolConfig,
}

impl SessionPool {
    /// Builds a pool of `config.size` sessions over the given backends,
    /// assigned round-robin when fewer backends than slots are supplied.
    pub fn new(backends: Vec<Arc<dyn ModelBackend>>, config: PoolConfig) -> Self {
        assert!(!backends.is_empty(), "session pool needs at least one backend");
        let slots = (0..config.size)
            .map(|i| {
                let backend = backends[i % backends.len()].clone();
                Arc::new(Mutex::new(Session::new(backend)))
            })
            .collect();
        Self { slots, config }
    }

    /// Initializes every session to `Ready`.
    pub async fn initialize(&self) {
        for slot in &self.slots {
            slot.lock().await.initialize();
        }
        info!(size = self.slots.len(), "session pool initialized");
    }

    /// Sessions currently able to serve requests.
    pub async fn serviceable(&self) -> usize {
        let mut n = 0;
        for slot in &self.slots {
            if slot.lock().await.state().is_serviceable() {
                n += 1;
            }
        }
        n
    }

    /// Acquires a `Ready` session whose backend serves `model`.
    ///
    /// With `acquire_timeout_ms == 0` a single scan decides; otherwise the
    /// pool is re-scanned every `acquire_poll_ms` until the deadline. Returns
    /// `NoFreeSessions` when nothing frees up in time.
    pub async fn acquire(&self, model: &str) -> Result<SessionLease, ParleyError> {
        let deadline = tokio::time::Instant::now()
            + Duration::from_millis(self.config.acquire_timeout_ms);

        loop {
            if let Some(lease) = self.try_acquire(model).await {
                return Ok(lease);
            }
            if self.config.acquire_timeout_ms == 0
                || tokio::time::Instant::now() >= deadline
            {
                return Err(ParleyError::NoFreeSessions);
            }
            tokio::time::sleep(Duration::from_millis(self.config.acquire_poll_ms)).await;
        }
    }

    async fn try_acquire(&self, model: &str) -> Option<SessionLease> {
        for slot in &self.slots {
            let mut session = slot.lock().await;
            if session.state() == SessionState::Ready && session.backend().supports(model) {
                session.lease();
                let lease = SessionLease {
                    session_id: session.id(),
                    backend: session.backend(),
                    slot: slot.clone(),
                };
                debug!(session_id = %lease.session_id, model, "session acquired");
                return Some(lease);
            }
        }
        None
    }

    /// Returns a session to the pool after a successful completion.
    pub async fn release(&self, lease: SessionLease) {
        lease.slot.lock().await.release();
        debug!(session_id = %lease.session_id, "session released");
    }

    /// Returns a session to the pool after a backend failure, applying the
    /// lifecycle consequences of the error class.
    pub async fn fail(&self, lease: SessionLease, error: &BackendError) {
        lease
            .slot
            .lock()
            .await
            .fail(error, self.config.max_session_retries);
    }
}
