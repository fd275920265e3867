// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Moderation trait — a black-box scoring function over generated content.

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::types::{ModerationContext, ModerationVerdict};

/// Content moderation collaborator.
///
/// Called after every successful generation. A non-blocked result is always
/// persisted; moderation failures are logged by the caller and treated as an
/// unflagged verdict.
#[async_trait]
pub trait Moderator: Send + Sync + 'static {
    async fn check(
        &self,
        content: &str,
        context: &ModerationContext,
    ) -> Result<ModerationVerdict, ParleyError>;
}
