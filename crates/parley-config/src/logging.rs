// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracing subscriber setup for embedding processes.

use tracing_subscriber::EnvFilter;

use crate::model::GatewayConfig;

/// Installs the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. Call once per process, before any worker starts.
pub fn init_logging(config: &GatewayConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={},warn", config.log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
