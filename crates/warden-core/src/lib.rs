//! Process-group tracking and termination engine for warden
//!
//! This crate contains the group manager:
//! - Preparation of commands so each spawn leads a new process group
//! - Registration of spawned groups in a lock-protected tracked set
//! - Two-phase termination (graceful wait, then SIGKILL to the whole group)
//! - Best-effort bulk cleanup of every tracked group under one deadline

mod error;
mod group;
mod manager;

pub use error::*;
pub use group::*;
pub use manager::*;

pub use warden_config::ManagerConfig;
