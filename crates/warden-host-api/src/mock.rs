//! Mock isolation capability for testing

use std::sync::{Arc, Mutex};
use tokio::process::Command;

use crate::{
    HostCapabilities, HostError, HostResult, IsolationCapability, SignalTarget, TermSignal,
};

/// A call made against the mock, in the order it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityCall {
    Isolate,
    Signal {
        target: SignalTarget,
        signal: TermSignal,
    },
}

/// Mock isolation capability for unit/integration testing
///
/// Every call is recorded. Without an inner capability the mock only
/// records; with one (see [`MockIsolation::wrapping`]) calls that are not
/// configured to fail are forwarded, so real processes can be killed while
/// the signal sequence stays observable.
pub struct MockIsolation {
    capabilities: HostCapabilities,
    inner: Option<Arc<dyn IsolationCapability>>,
    calls: Arc<Mutex<Vec<CapabilityCall>>>,

    /// Configure group-targeted signals to fail as if the group were gone
    pub fail_group_signal: Arc<Mutex<bool>>,

    /// Configure single-process signals to fail as if the process were gone
    pub fail_process_signal: Arc<Mutex<bool>>,
}

impl MockIsolation {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::group_capable(),
            inner: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_group_signal: Arc::new(Mutex::new(false)),
            fail_process_signal: Arc::new(Mutex::new(false)),
        }
    }

    /// Record calls and forward them to `inner`
    pub fn wrapping(inner: Arc<dyn IsolationCapability>) -> Self {
        Self {
            capabilities: inner.capabilities().clone(),
            inner: Some(inner),
            ..Self::new()
        }
    }

    pub fn with_capabilities(mut self, caps: HostCapabilities) -> Self {
        self.capabilities = caps;
        self
    }

    /// All calls recorded so far
    pub fn calls(&self) -> Vec<CapabilityCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Signals recorded so far, in order
    pub fn signals(&self) -> Vec<(SignalTarget, TermSignal)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CapabilityCall::Signal { target, signal } => Some((target, signal)),
                CapabilityCall::Isolate => None,
            })
            .collect()
    }

    /// Whether any SIGKILL-equivalent was requested
    pub fn sent_forceful(&self) -> bool {
        self.signals()
            .iter()
            .any(|(_, signal)| *signal == TermSignal::Forceful)
    }

    pub fn set_fail_group_signal(&self, fail: bool) {
        *self.fail_group_signal.lock().unwrap() = fail;
    }

    pub fn set_fail_process_signal(&self, fail: bool) {
        *self.fail_process_signal.lock().unwrap() = fail;
    }

    fn record(&self, call: CapabilityCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for MockIsolation {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationCapability for MockIsolation {
    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    fn isolate(&self, command: &mut Command) {
        self.record(CapabilityCall::Isolate);
        if let Some(inner) = &self.inner {
            inner.isolate(command);
        }
    }

    fn signal_group(&self, pgid: u32, signal: TermSignal) -> HostResult<()> {
        self.record(CapabilityCall::Signal {
            target: SignalTarget::Group(pgid),
            signal,
        });

        if *self.fail_group_signal.lock().unwrap() {
            return Err(HostError::GroupNotFound(pgid));
        }

        match &self.inner {
            Some(inner) => inner.signal_group(pgid, signal),
            None => Ok(()),
        }
    }

    fn signal_process(&self, pid: u32, signal: TermSignal) -> HostResult<()> {
        self.record(CapabilityCall::Signal {
            target: SignalTarget::Process(pid),
            signal,
        });

        if *self.fail_process_signal.lock().unwrap() {
            return Err(HostError::ProcessNotFound(pid));
        }

        match &self.inner {
            Some(inner) => inner.signal_process(pid, signal),
            None => Ok(()),
        }
    }
}
