// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley conversational gateway.
//!
//! Two layers: [`BackendError`] is the *classified* outcome of a single model
//! backend call (the retry engine decides what to do with it), and
//! [`ParleyError`] is the surfaced taxonomy — every variant maps to a distinct
//! user-visible notice category so the transport layer never has to inspect
//! internals.

use std::time::Duration;

use thiserror::Error;

/// The primary error type surfaced by Parley's conversation layer.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// A generation is already in flight for this conversation. The caller
    /// must tell the user to wait; the request is never queued.
    #[error("conversation is busy with another generation")]
    Busy,

    /// The conversation was not initialized before use. Lifecycle bug in the
    /// caller, not a user-facing condition.
    #[error("conversation is not active")]
    InactiveConversation,

    /// The assigned session's provider account is permanently unusable
    /// (credentials revoked, quota exhausted). Operators must intervene.
    #[error("session unusable: {reason}")]
    SessionUnusable { reason: String },

    /// Every session in the pool is busy and the bounded wait expired.
    #[error("no free sessions available")]
    NoFreeSessions,

    /// The backend returned an empty completion. Terminal; retrying cannot help.
    #[error("backend returned an empty completion")]
    EmptyCompletion,

    /// The assembled prompt exceeds the backend's context limit. Terminal.
    #[error("prompt exceeds the backend context limit")]
    PromptTooLong,

    /// The retry engine exhausted its attempt cap without a usable result.
    #[error("generation failed after {attempts} attempts: {source}")]
    GenerationFailed {
        attempts: u32,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The conversation's cooldown has not elapsed yet.
    #[error("cooldown active for another {remaining:?}")]
    CooldownActive { remaining: Duration },

    /// The selected tone requires an entitlement the user does not hold.
    #[error("tone {tone} requires a premium entitlement")]
    ToneRestricted { tone: String },

    /// The user is banned from the gateway.
    #[error("user is banned")]
    UserBanned,

    /// Backing store errors on the read path. Write-path failures are retried
    /// by the flush cycle and never surface here.
    #[error("database error: {source}")]
    Database {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, missing required fields).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Classified failure from a single model backend call.
///
/// Backends translate their provider-specific failures into this enum at the
/// adapter boundary; the core never sees raw provider errors.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// 429-class throttling from the provider.
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    /// Transport-level failure (connection reset, DNS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The provider account's quota is exhausted. Fatal to the session.
    #[error("provider quota exhausted")]
    QuotaExhausted,

    /// The provider credentials were revoked. Fatal to the session.
    #[error("provider credentials revoked")]
    CredentialsRevoked,

    /// The provider returned a completion with no content.
    #[error("empty completion")]
    EmptyCompletion,

    /// The prompt exceeds the model's context window.
    #[error("prompt too long")]
    PromptTooLong,

    /// Anything the adapter could not classify.
    #[error("backend error: {0}")]
    Other(String),
}

impl BackendError {
    /// Whether this failure permanently disqualifies the owning session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::QuotaExhausted | Self::CredentialsRevoked)
    }
}
