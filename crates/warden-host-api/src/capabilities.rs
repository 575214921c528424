//! Host capabilities model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which process model an isolation capability implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationKind {
    /// New process group on spawn, group-targeted signals
    GroupCapable,
    /// Isolation and group kill degrade to single-process operations
    BestEffort,
}

impl fmt::Display for IsolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationKind::GroupCapable => write!(f, "group-capable"),
            IsolationKind::BestEffort => write!(f, "best-effort"),
        }
    }
}

/// Describes what an isolation capability can do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostCapabilities {
    pub kind: IsolationKind,

    /// Can place a new process in its own group at spawn time
    pub can_isolate_on_spawn: bool,

    /// Can deliver a signal to a whole process group
    pub can_signal_group: bool,
}

impl HostCapabilities {
    /// Capabilities of a POSIX host with native process groups
    pub fn group_capable() -> Self {
        Self {
            kind: IsolationKind::GroupCapable,
            can_isolate_on_spawn: true,
            can_signal_group: true,
        }
    }

    /// Minimal capabilities (single-process signals only)
    pub fn best_effort() -> Self {
        Self {
            kind: IsolationKind::BestEffort,
            can_isolate_on_spawn: false,
            can_signal_group: false,
        }
    }
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self::best_effort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_effort_capabilities() {
        let caps = HostCapabilities::best_effort();
        assert_eq!(caps.kind, IsolationKind::BestEffort);
        assert!(!caps.can_signal_group);
        assert!(!caps.can_isolate_on_spawn);
    }

    #[test]
    fn group_capable_capabilities() {
        let caps = HostCapabilities::group_capable();
        assert_eq!(caps.kind, IsolationKind::GroupCapable);
        assert!(caps.can_signal_group);
        assert!(caps.can_isolate_on_spawn);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&IsolationKind::GroupCapable).unwrap();
        assert_eq!(json, "\"group_capable\"");
        assert_eq!(IsolationKind::BestEffort.to_string(), "best-effort");
    }
}
