//! Validated settings (converted from raw config)

use crate::schema::RawConfig;
use std::time::Duration;

/// Default grace window before escalating to SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);

/// Default pause after bulk cleanup signals
pub const DEFAULT_SETTLE_PERIOD: Duration = Duration::from_millis(100);

/// Default overall deadline for stopping a child from `warden run`
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Fully validated settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub manager: ManagerConfig,
    pub run: RunConfig,
}

/// Timing and behaviour of the group manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// How long `terminate` waits for a natural exit before SIGKILL
    pub grace_period: Duration,

    /// How long `cleanup_all` pauses after issuing its signals
    pub settle_period: Duration,

    /// Send SIGTERM to the group at the start of the graceful phase
    pub graceful_signal: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            settle_period: DEFAULT_SETTLE_PERIOD,
            graceful_signal: false,
        }
    }
}

/// Settings for the `warden run` exerciser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub stop_timeout: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

impl Settings {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let manager = ManagerConfig {
            grace_period: raw
                .manager
                .grace_period_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_GRACE_PERIOD),
            settle_period: raw
                .manager
                .settle_period_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_SETTLE_PERIOD),
            graceful_signal: raw.manager.graceful_signal.unwrap_or(false),
        };

        let run = RunConfig {
            stop_timeout: raw
                .run
                .stop_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
        };

        Self { manager, run }
    }
}
