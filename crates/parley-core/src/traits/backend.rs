// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Model backend trait for LLM provider integrations.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{Completion, PromptContext};

/// A pluggable language-model backend.
///
/// Implementations own their provider credentials and translate provider
/// failures into classified [`BackendError`] variants at this boundary; the
/// retry engine only ever sees the classification.
#[async_trait]
pub trait ModelBackend: Send + Sync + 'static {
    /// Human-readable name of this backend instance.
    fn name(&self) -> &str;

    /// Whether this backend can serve the given model identifier.
    ///
    /// Used by the session pool to match sessions to a conversation's tone.
    fn supports(&self, model: &str) -> bool {
        let _ = model;
        true
    }

    /// Produces one completion for the assembled prompt context.
    async fn complete(&self, context: PromptContext) -> Result<Completion, BackendError>;
}
