// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley gateway.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Gateway identity and logging settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Session pool settings.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Generation retry engine settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Cooldown policy settings.
    #[serde(default)]
    pub cooldown: CooldownConfig,

    /// Write-behind cache/queue settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation lifecycle settings.
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Backing store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Tone catalog entries. Empty means the built-in catalog is used.
    #[serde(default)]
    pub tones: Vec<ToneEntry>,
}

/// Gateway identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Display name of this gateway deployment.
    #[serde(default = "default_gateway_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_gateway_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_gateway_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Session pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of sessions in the fixed pool.
    #[serde(default = "default_pool_size")]
    pub size: usize,

    /// How long `acquire` waits for a Ready session before failing with
    /// `NoFreeSessions`. Zero fails immediately.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,

    /// Polling interval while waiting for a Ready session.
    #[serde(default = "default_acquire_poll_ms")]
    pub acquire_poll_ms: u64,

    /// Reinitialization attempts before a failed session is Stopped.
    #[serde(default = "default_max_session_retries")]
    pub max_session_retries: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            acquire_poll_ms: default_acquire_poll_ms(),
            max_session_retries: default_max_session_retries(),
        }
    }
}

fn default_pool_size() -> usize {
    4
}

fn default_acquire_timeout_ms() -> u64 {
    0
}

fn default_acquire_poll_ms() -> u64 {
    50
}

fn default_max_session_retries() -> u32 {
    3
}

/// Generation retry engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Maximum attempts per generation before `GenerationFailed`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Linear backoff step `k`: attempt `n` waits `n*k + k`.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    10
}

fn default_backoff_step_ms() -> u64 {
    5_000
}

/// Cooldown policy configuration.
///
/// Effective duration = tier multiplier x tone multiplier applied to the
/// base (or the tone's override of the base).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CooldownConfig {
    /// Base cooldown duration before any modifiers.
    #[serde(default = "default_cooldown_base_ms")]
    pub base_ms: u64,

    /// Multiplier for the Free tier.
    #[serde(default = "default_free_multiplier")]
    pub free_multiplier: f64,

    /// Multiplier for the Voter tier.
    #[serde(default = "default_voter_multiplier")]
    pub voter_multiplier: f64,

    /// Multiplier for the GuildPremium tier.
    #[serde(default = "default_guild_premium_multiplier")]
    pub guild_premium_multiplier: f64,

    /// Multiplier for the UserPremium tier.
    #[serde(default = "default_user_premium_multiplier")]
    pub user_premium_multiplier: f64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            base_ms: default_cooldown_base_ms(),
            free_multiplier: default_free_multiplier(),
            voter_multiplier: default_voter_multiplier(),
            guild_premium_multiplier: default_guild_premium_multiplier(),
            user_premium_multiplier: default_user_premium_multiplier(),
        }
    }
}

fn default_cooldown_base_ms() -> u64 {
    60_000
}

fn default_free_multiplier() -> f64 {
    1.0
}

fn default_voter_multiplier() -> f64 {
    0.5
}

fn default_guild_premium_multiplier() -> f64 {
    0.25
}

fn default_user_premium_multiplier() -> f64 {
    0.1
}

/// Write-behind cache/queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Interval between flush cycles.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_flush_interval_ms() -> u64 {
    5_000
}

/// Conversation lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationConfig {
    /// Idle time after which an in-memory replica is evicted.
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Interval of the eviction sweep task.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_idle_ttl_secs() -> u64 {
    1_800
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Backing store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "parley.db".to_string()
}

/// One tone catalog entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToneEntry {
    pub id: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Model identifier this tone routes to.
    pub model: String,

    /// Whether a premium entitlement is required to select this tone.
    #[serde(default)]
    pub premium: bool,

    /// Replaces the configured base cooldown for this tone, if set.
    #[serde(default)]
    pub cooldown_override_ms: Option<u64>,

    /// Additional multiplier applied on top of the tier base.
    #[serde(default = "default_tone_multiplier")]
    pub cooldown_multiplier: f64,
}

fn default_tone_multiplier() -> f64 {
    1.0
}
