//! Isolation capability implementations

use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

use warden_host_api::{
    HostCapabilities, HostError, HostResult, IsolationCapability, SignalTarget, TermSignal,
};

/// Pick the isolation capability for the platform this binary was built for
pub fn platform_capability() -> Arc<dyn IsolationCapability> {
    #[cfg(unix)]
    {
        Arc::new(ProcessGroups::new())
    }
    #[cfg(not(unix))]
    {
        Arc::new(BestEffort::new())
    }
}

/// pid 0 addresses the caller's own group and pid 1 is init; neither may be signalled
fn checked_raw_pid(id: u32, target: SignalTarget) -> HostResult<i32> {
    match i32::try_from(id) {
        Ok(raw) if raw > 1 => Ok(raw),
        _ => Err(HostError::Refused(format!("will not signal {}", target))),
    }
}

#[cfg(unix)]
fn to_nix_signal(signal: TermSignal) -> nix::sys::signal::Signal {
    match signal {
        TermSignal::Graceful => nix::sys::signal::Signal::SIGTERM,
        TermSignal::Forceful => nix::sys::signal::Signal::SIGKILL,
    }
}

#[cfg(unix)]
fn kill_one(pid: u32, signal: TermSignal) -> HostResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal;
    use nix::unistd::Pid;

    let target = SignalTarget::Process(pid);
    let raw = checked_raw_pid(pid, target)?;

    match signal::kill(Pid::from_raw(raw), to_nix_signal(signal)) {
        Ok(()) => {
            debug!(pid = pid, signal = %signal, "Sent signal to process");
            Ok(())
        }
        Err(Errno::ESRCH) => Err(HostError::ProcessNotFound(pid)),
        Err(e) => Err(HostError::SignalFailed {
            target,
            signal,
            source: e.into(),
        }),
    }
}

/// POSIX process groups: each spawned process leads a new group and
/// termination is delivered to the whole group at once.
#[cfg(unix)]
pub struct ProcessGroups {
    capabilities: HostCapabilities,
}

#[cfg(unix)]
impl ProcessGroups {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::group_capable(),
        }
    }
}

#[cfg(unix)]
impl Default for ProcessGroups {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
impl IsolationCapability for ProcessGroups {
    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    fn isolate(&self, command: &mut Command) {
        // The child becomes leader of a fresh group, so pgid == pid
        command.process_group(0);
    }

    fn signal_group(&self, pgid: u32, signal: TermSignal) -> HostResult<()> {
        use nix::errno::Errno;
        use nix::sys::signal;
        use nix::unistd::{getpgrp, Pid};

        let target = SignalTarget::Group(pgid);
        let raw = checked_raw_pid(pgid, target)?;

        // Never kill our own process group.
        if Pid::from_raw(raw) == getpgrp() {
            return Err(HostError::Refused(format!(
                "{} is the caller's own group",
                target
            )));
        }

        match signal::killpg(Pid::from_raw(raw), to_nix_signal(signal)) {
            Ok(()) => {
                debug!(pgid = pgid, signal = %signal, "Sent signal to process group");
                Ok(())
            }
            Err(Errno::ESRCH) => Err(HostError::GroupNotFound(pgid)),
            Err(e) => Err(HostError::SignalFailed {
                target,
                signal,
                source: e.into(),
            }),
        }
    }

    fn signal_process(&self, pid: u32, signal: TermSignal) -> HostResult<()> {
        kill_one(pid, signal)
    }
}

/// Degraded isolation: spawned processes stay in the caller's group and
/// only the tracked process itself can be signalled.
pub struct BestEffort {
    capabilities: HostCapabilities,
}

impl BestEffort {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::best_effort(),
        }
    }
}

impl Default for BestEffort {
    fn default() -> Self {
        Self::new()
    }
}

impl IsolationCapability for BestEffort {
    fn capabilities(&self) -> &HostCapabilities {
        &self.capabilities
    }

    fn isolate(&self, _command: &mut Command) {}

    fn signal_group(&self, pgid: u32, _signal: TermSignal) -> HostResult<()> {
        Err(HostError::Unsupported(format!(
            "group-targeted signals (process group {})",
            pgid
        )))
    }

    fn signal_process(&self, pid: u32, signal: TermSignal) -> HostResult<()> {
        #[cfg(unix)]
        {
            kill_one(pid, signal)
        }
        #[cfg(not(unix))]
        {
            let _ = signal;
            Err(HostError::Unsupported(format!(
                "signalling process {} by id",
                pid
            )))
        }
    }
}
