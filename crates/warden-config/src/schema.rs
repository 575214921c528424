//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Group manager timing
    #[serde(default)]
    pub manager: RawManagerConfig,

    /// Settings for `warden run`
    #[serde(default)]
    pub run: RawRunConfig,
}

/// Group manager settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawManagerConfig {
    /// How long a terminating process may take to exit on its own
    pub grace_period_ms: Option<u64>,

    /// Pause after bulk cleanup signals so the OS can reap
    pub settle_period_ms: Option<u64>,

    /// Also send SIGTERM to the group during the graceful phase
    pub graceful_signal: Option<bool>,
}

/// Exerciser settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawRunConfig {
    /// Overall deadline for stopping the child on shutdown
    pub stop_timeout_ms: Option<u64>,
}
