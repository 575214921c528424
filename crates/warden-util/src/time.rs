//! Time utilities for warden
//!
//! Termination waits are bounded by a caller-supplied timeout. [`Deadline`]
//! turns that timeout into a point in monotonic time so that each phase can
//! ask how much of the budget is left, immune to wall-clock changes.

use std::time::{Duration, Instant};

/// Represents a point in monotonic time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonotonicInstant(Instant);

impl MonotonicInstant {
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

/// An overall time budget started at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: MonotonicInstant,
    budget: Duration,
}

impl Deadline {
    /// Start a deadline `budget` from now
    pub fn after(budget: Duration) -> Self {
        Self {
            started: MonotonicInstant::now(),
            budget,
        }
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started.elapsed())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Clamp `window` to what is left of the budget
    pub fn clamp(&self, window: Duration) -> Duration {
        window.min(self.remaining())
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let millis = d.subsec_millis();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if total_secs > 0 {
        format!("{}s", seconds)
    } else {
        format!("{}ms", millis)
    }
}
