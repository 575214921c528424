//! Isolation capability trait

use std::fmt;
use thiserror::Error;
use tokio::process::Command;

use crate::{HostCapabilities, IsolationKind};

/// Errors from isolation capability operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Process group {0} not found")]
    GroupNotFound(u32),

    #[error("Process {0} not found")]
    ProcessNotFound(u32),

    #[error("Failed to send {signal} to {target}: {source}")]
    SignalFailed {
        target: SignalTarget,
        signal: TermSignal,
        #[source]
        source: std::io::Error,
    },

    #[error("Refused: {0}")]
    Refused(String),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// Termination signal to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermSignal {
    /// Revocable request to exit (SIGTERM)
    Graceful,
    /// Unblockable kill (SIGKILL)
    Forceful,
}

impl fmt::Display for TermSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermSignal::Graceful => write!(f, "SIGTERM"),
            TermSignal::Forceful => write!(f, "SIGKILL"),
        }
    }
}

/// Who a signal is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalTarget {
    Group(u32),
    Process(u32),
}

impl fmt::Display for SignalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalTarget::Group(pgid) => write!(f, "process group {}", pgid),
            SignalTarget::Process(pid) => write!(f, "process {}", pid),
        }
    }
}

/// Process-isolation capability - implemented by platform-specific adapters
///
/// Signal delivery is fire-and-forget: implementations must not block
/// waiting for the target to exit, and must report an error when the
/// target no longer exists instead of treating it as success.
pub trait IsolationCapability: Send + Sync {
    /// Get the capabilities of this implementation
    fn capabilities(&self) -> &HostCapabilities;

    fn kind(&self) -> IsolationKind {
        self.capabilities().kind
    }

    /// Configure a not-yet-spawned command so the new process leads its own group
    fn isolate(&self, command: &mut Command);

    /// Deliver `signal` to every member of process group `pgid`
    fn signal_group(&self, pgid: u32, signal: TermSignal) -> HostResult<()>;

    /// Deliver `signal` to the single process `pid`
    fn signal_process(&self, pid: u32, signal: TermSignal) -> HostResult<()>;
}
