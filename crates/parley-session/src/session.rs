// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One model session: a backend handle plus its lifecycle state.

use std::sync::Arc;

use parley_core::error::BackendError;
use parley_core::traits::ModelBackend;
use tracing::{debug, warn};
use uuid::Uuid;

/// Lifecycle of a session.
///
/// `Unusable` is terminal: the backend reported a session-fatal condition
/// (quota exhausted, credentials revoked) and no amount of reinitialization
/// will help. `Stopped` is reached when transient reinitialization attempts
/// run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Busy,
    Error,
    Stopped,
    Unusable,
}

impl SessionState {
    /// Whether the session can ever serve another request.
    pub fn is_serviceable(self) -> bool {
        !matches!(self, SessionState::Stopped | SessionState::Unusable)
    }
}

pub struct Session {
    id: Uuid,
    state: SessionState,
    /// Reinitialization attempts consumed since the last healthy completion.
    retries: u32,
    backend: Arc<dyn ModelBackend>,
}

impl Session {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Uninitialized,
            retries: 0,
            backend,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn backend(&self) -> Arc<dyn ModelBackend> {
        self.backend.clone()
    }

    /// Brings the session to `Ready`. No-op for terminal states.
    pub fn initialize(&mut self) {
        if !self.state.is_serviceable() {
            return;
        }
        self.state = SessionState::Initializing;
        debug!(session_id = %self.id, backend = self.backend.name(), "session initializing");
        self.state = SessionState::Ready;
    }

    /// Marks the session leased. Caller must hold the pool slot.
    pub(crate) fn lease(&mut self) {
        debug_assert_eq!(self.state, SessionState::Ready);
        self.state = SessionState::Busy;
    }

    /// Returns a leased session to `Ready` and clears the retry count.
    pub(crate) fn release(&mut self) {
        if self.state == SessionState::Busy {
            self.state = SessionState::Ready;
            self.retries = 0;
        }
    }

    /// Records a backend failure against this session.
    ///
    /// Session-fatal errors park it as `Unusable` permanently. Transient
    /// errors reinitialize it, up to `max_retries` consecutive attempts,
    /// after which it is `Stopped`.
    pub(crate) fn fail(&mut self, error: &BackendError, max_retries: u32) {
        if error.is_session_fatal() {
            warn!(
                session_id = %self.id,
                error = %error,
                "session-fatal backend error, session permanently unusable"
            );
            self.state = SessionState::Unusable;
            return;
        }

        self.retries += 1;
        if self.retries > max_retries {
            warn!(
                session_id = %self.id,
                retries = self.retries,
                "session exceeded reinitialization attempts, stopping"
            );
            self.state = SessionState::Stopped;
            return;
        }

        debug!(
            session_id = %self.id,
            retries = self.retries,
            error = %error,
            "session errored, reinitializing"
        );
        self.state = SessionState::Error;
        self.initialize();
    }
}
