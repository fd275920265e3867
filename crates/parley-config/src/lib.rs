// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model and loader for the Parley gateway.

pub mod loader;
pub mod logging;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use logging::init_logging;
pub use model::{ParleyConfig, PoolConfig};
