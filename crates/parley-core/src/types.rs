// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the Parley workspace.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Stable identifier for an end user (and therefore their conversation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier for a tone (personality/model-routing entry) in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToneId(pub String);

impl std::fmt::Display for ToneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque handle to a transport-layer message (the triggering user message or
/// the bot's reply). Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRef(pub String);

/// Subscription tier of a user, driving cooldown policy and tone entitlement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum SubscriptionTier {
    Free,
    Voter,
    GuildPremium,
    UserPremium,
}

impl SubscriptionTier {
    /// Whether this tier unlocks premium-restricted tones.
    pub fn is_premium(self) -> bool {
        matches!(self, Self::GuildPremium | Self::UserPremium)
    }
}

/// Logical collection in the backing store, the first half of every
/// write-behind queue key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Conversations,
    Interactions,
}

/// Token accounting reported by a backend for one completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// An image attached to a user prompt.
///
/// `data` holds the raw bytes for the backend call; it is stripped before
/// persistence along with transport handles.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub name: String,
    /// MIME type as reported by the transport.
    pub kind: String,
    pub data: Vec<u8>,
    /// Caption derived by an upstream vision pass, if any.
    pub description: Option<String>,
    /// OCR output from an upstream pass, if any.
    pub detected_text: Option<String>,
}

/// The user side of one interaction.
#[derive(Debug, Clone)]
pub struct PromptInput {
    pub text: String,
    pub images: Vec<ImageAttachment>,
}

impl PromptInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }
}

/// A successful completion from a model backend, post-moderation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub verdict: Option<ModerationVerdict>,
}

/// Verdict from the moderation collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub blocked: bool,
    #[serde(default)]
    pub scores: HashMap<String, f64>,
}

/// Context handed to the moderation collaborator alongside the content.
#[derive(Debug, Clone)]
pub struct ModerationContext {
    pub user_id: UserId,
    pub tone: ToneId,
}

/// One completed request/response pair in a conversation's history.
#[derive(Debug, Clone)]
pub struct ChatInteraction {
    pub id: String,
    pub input: PromptInput,
    pub output: Completion,
    /// Transport handle of the originating message. Not persisted.
    pub trigger: Option<TransportRef>,
    /// Transport handle of the response message. Not persisted.
    pub reply: Option<TransportRef>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ChatInteraction {
    /// Strips transport handles and raw image bytes for persistence.
    pub fn stripped(&self, tone: &ToneId) -> StoredInteraction {
        StoredInteraction {
            id: self.id.clone(),
            requested_at: self.requested_at.to_rfc3339(),
            completed_at: self.completed_at.to_rfc3339(),
            input: StoredInput {
                text: self.input.text.clone(),
                images: self
                    .input
                    .images
                    .iter()
                    .map(|img| StoredImage {
                        name: img.name.clone(),
                        kind: img.kind.clone(),
                        description: img.description.clone(),
                        detected_text: img.detected_text.clone(),
                    })
                    .collect(),
            },
            output: self.output.clone(),
            tone: tone.clone(),
        }
    }
}

/// Persistable form of a [`ChatInteraction`]: no transport handles, no image
/// bytes. One row per generated message, independent of conversation TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredInteraction {
    pub id: String,
    pub requested_at: String,
    pub completed_at: String,
    pub input: StoredInput,
    pub output: Completion,
    pub tone: ToneId,
}

/// Stripped prompt input for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredInput {
    pub text: String,
    #[serde(default)]
    pub images: Vec<StoredImage>,
}

/// Image metadata retained in the stored form (bytes dropped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub name: String,
    pub kind: String,
    pub description: Option<String>,
    pub detected_text: Option<String>,
}

/// Everything a backend needs to produce one completion.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub user_id: UserId,
    /// Model selected by the conversation's tone.
    pub model: String,
    /// Prior turns, oldest first.
    pub turns: Vec<ChatTurn>,
    pub prompt: PromptInput,
}

/// One prior exchange, flattened for prompt assembly.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user: String,
    pub assistant: String,
}
