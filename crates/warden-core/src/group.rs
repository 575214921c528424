//! Tracked process group record

use chrono::{DateTime, Local};
use std::time::Duration;

/// A process group the manager is responsible for
#[derive(Debug, Clone)]
pub struct TrackedGroup {
    /// Group id; equals the leader's pid at spawn time
    pub pgid: u32,

    /// Wall-clock registration time (diagnostics only)
    pub registered_at: DateTime<Local>,
}

impl TrackedGroup {
    pub fn new(pgid: u32) -> Self {
        Self {
            pgid,
            registered_at: Local::now(),
        }
    }

    /// How long the group has been tracked
    pub fn age(&self) -> Duration {
        (Local::now() - self.registered_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}
