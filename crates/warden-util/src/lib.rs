//! Shared utilities for warden
//!
//! This crate provides:
//! - Monotonic deadlines for bounded termination waits
//! - Duration formatting helpers
//! - Default paths for the configuration file

mod paths;
mod time;

pub use paths::*;
pub use time::*;
