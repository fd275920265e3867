// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./parley.toml` > `~/.config/parley/parley.toml` >
//! `/etc/parley/parley.toml` with environment variable overrides via the
//! `PARLEY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ParleyConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/parley/parley.toml` (system-wide)
/// 3. `~/.config/parley/parley.toml` (user XDG config)
/// 4. `./parley.toml` (local directory)
/// 5. `PARLEY_*` environment variables
pub fn load_config() -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file("/etc/parley/parley.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("parley/parley.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("parley.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit inline configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParleyConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ParleyConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `PARLEY_POOL_ACQUIRE_TIMEOUT_MS` must map
/// to `pool.acquire_timeout_ms`, not `pool.acquire.timeout.ms`.
fn env_provider() -> Env {
    Env::prefixed("PARLEY_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("gateway_", "gateway.", 1)
            .replacen("pool_", "pool.", 1)
            .replacen("retry_", "retry.", 1)
            .replacen("cooldown_", "cooldown.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("conversation_", "conversation.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
