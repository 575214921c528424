//! Unix isolation adapters for warden
//!
//! Provides:
//! - `ProcessGroups`: new process group on spawn, SIGTERM/SIGKILL to the whole group
//! - `BestEffort`: single-process signalling for hosts without usable groups
//! - Structured enumeration of the live process table (Linux `/proc`)

mod isolation;
pub mod process_table;

pub use isolation::*;
pub use process_table::ProcessRecord;
