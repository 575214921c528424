//! Group manager: tracked set, two-phase termination, bulk cleanup

use std::collections::HashMap;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use warden_config::ManagerConfig;
use warden_host_api::{HostError, IsolationCapability, IsolationKind, TermSignal};
use warden_util::Deadline;

use crate::{GroupError, GroupResult, TrackedGroup};

/// Owns the set of process groups spawned on behalf of the application and
/// tears them down so that no descendant outlives its group.
///
/// All methods take `&self`; share the manager as `Arc<GroupManager>`.
pub struct GroupManager {
    isolation: Arc<dyn IsolationCapability>,
    config: ManagerConfig,
    tracked: Mutex<HashMap<u32, TrackedGroup>>,
}

impl GroupManager {
    pub fn new(isolation: Arc<dyn IsolationCapability>, config: ManagerConfig) -> Self {
        info!(
            isolation = %isolation.kind(),
            grace_period_ms = config.grace_period.as_millis() as u64,
            settle_period_ms = config.settle_period.as_millis() as u64,
            graceful_signal = config.graceful_signal,
            "Group manager created"
        );

        Self {
            isolation,
            config,
            tracked: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn capability_kind(&self) -> IsolationKind {
        self.isolation.kind()
    }

    // The set only holds plain records, so a panic elsewhere cannot leave it
    // half-updated; recover the guard instead of propagating the poison.
    fn tracked(&self) -> MutexGuard<'_, HashMap<u32, TrackedGroup>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Configure `command` so the spawned process leads a new process group.
    ///
    /// Must be called before the command is spawned. With a best-effort
    /// capability this is a no-op and termination later falls back to
    /// killing the single tracked process.
    pub fn prepare(&self, command: &mut Command) {
        if !self.isolation.capabilities().can_isolate_on_spawn {
            debug!("Process-group isolation unavailable, spawning in caller's group");
        }
        self.isolation.isolate(command);
    }

    /// Start tracking the group led by a freshly spawned, prepared child.
    ///
    /// Returns the group id.
    pub fn register(&self, child: &Child) -> GroupResult<u32> {
        let pgid = child
            .id()
            .ok_or_else(|| GroupError::invalid("process has no id (already reaped)"))?;
        self.register_group(pgid)?;
        Ok(pgid)
    }

    /// Start tracking `pgid` directly, for processes spawned outside tokio.
    pub fn register_group(&self, pgid: u32) -> GroupResult<()> {
        if pgid <= 1 {
            return Err(GroupError::invalid(format!(
                "refusing to track reserved process group {}",
                pgid
            )));
        }

        let previous = self.tracked().insert(pgid, TrackedGroup::new(pgid));
        if previous.is_some() {
            warn!(pgid = pgid, "Process group registered twice without termination");
        } else {
            debug!(pgid = pgid, "Registered process group");
        }

        Ok(())
    }

    /// Number of groups currently tracked
    pub fn tracked_count(&self) -> usize {
        self.tracked().len()
    }

    pub fn is_tracked(&self, pgid: u32) -> bool {
        self.tracked().contains_key(&pgid)
    }

    /// Snapshot of tracked groups, ordered by pgid
    pub fn tracked_groups(&self) -> Vec<TrackedGroup> {
        let mut groups: Vec<TrackedGroup> = self.tracked().values().cloned().collect();
        groups.sort_by_key(|g| g.pgid);
        groups
    }

    fn untrack(&self, pgid: u32) -> bool {
        self.tracked().remove(&pgid).is_some()
    }

    /// Tear down the group led by `child`, waiting at most `timeout`.
    ///
    /// The group is untracked before anything is signalled and stays
    /// untracked whatever the outcome. The child first gets the grace
    /// period to exit on its own (stdin closed, optionally SIGTERM). If
    /// `timeout` runs out first the call fails with
    /// [`GroupError::TerminationTimeout`] without escalating; otherwise the
    /// whole group gets SIGKILL and the remaining time is spent reaping.
    pub async fn terminate(&self, child: &mut Child, timeout: Duration) -> GroupResult<()> {
        let pgid = child
            .id()
            .ok_or_else(|| GroupError::invalid("process has no id (already reaped)"))?;
        let deadline = Deadline::after(timeout);

        if !self.untrack(pgid) {
            debug!(pgid = pgid, "Terminating process group that was not tracked");
        }

        // Graceful phase
        if child.stdin.take().is_some() {
            debug!(pgid = pgid, "Closed stdin");
        }
        if self.config.graceful_signal {
            self.request_stop(pgid);
        }

        let grace = self.config.grace_period;
        if let Some(status) = wait_for_exit(child, pgid, deadline.clamp(grace)).await? {
            info!(pgid = pgid, status = %status, "Process group exited during grace period");
            return Ok(());
        }

        if timeout <= grace || deadline.is_expired() {
            warn!(
                pgid = pgid,
                timeout_ms = timeout.as_millis() as u64,
                "Deadline reached before grace period ended, not escalating"
            );
            return Err(GroupError::TerminationTimeout { pgid, timeout });
        }

        // Forceful phase
        self.kill_group_of(child, pgid)?;

        match wait_for_exit(child, pgid, deadline.remaining()).await? {
            Some(status) => {
                info!(pgid = pgid, status = %status, "Process group killed");
                Ok(())
            }
            None => {
                warn!(pgid = pgid, "Process not reaped after SIGKILL");
                Err(GroupError::ReapTimeout { pgid, timeout })
            }
        }
    }

    /// SIGTERM the group, or only its leader without group signalling.
    ///
    /// The leader has not been reaped yet, so its pid cannot have been reused.
    fn request_stop(&self, pgid: u32) {
        let result = if self.isolation.capabilities().can_signal_group {
            self.isolation.signal_group(pgid, TermSignal::Graceful)
        } else {
            self.isolation.signal_process(pgid, TermSignal::Graceful)
        };
        if let Err(e) = result {
            warn!(pgid = pgid, error = %e, "Failed to send SIGTERM");
        }
    }

    /// SIGKILL the whole group, falling back to the child itself.
    fn kill_group_of(&self, child: &mut Child, pgid: u32) -> GroupResult<()> {
        if self.isolation.capabilities().can_signal_group {
            match self.isolation.signal_group(pgid, TermSignal::Forceful) {
                Ok(()) => {
                    info!(pgid = pgid, "Sent SIGKILL to process group");
                    return Ok(());
                }
                Err(e) => warn!(
                    pgid = pgid,
                    error = %e,
                    "Group kill failed, killing tracked process only"
                ),
            }
        }

        child.start_kill().map_err(|source| {
            warn!(pgid = pgid, error = %source, "Fallback kill failed");
            GroupError::ForcefulTerminationFailed {
                pgid,
                source: HostError::Io(source),
            }
        })
    }

    /// Sweep the group of a leader that has already exited and been reaped.
    ///
    /// Descendants may still hold the group, so it gets SIGKILL, but the
    /// leader's pid is never signalled on its own: it may already belong to
    /// an unrelated process. Returns whether any member was still alive.
    pub fn sweep_exited(&self, pgid: u32) -> GroupResult<bool> {
        if !self.untrack(pgid) {
            debug!(pgid = pgid, "Sweeping process group that was not tracked");
        }

        if !self.isolation.capabilities().can_signal_group {
            debug!(pgid = pgid, "No group signalling, nothing left to sweep");
            return Ok(false);
        }

        match self.isolation.signal_group(pgid, TermSignal::Forceful) {
            Ok(()) => {
                info!(pgid = pgid, "Killed members left behind by exited leader");
                Ok(true)
            }
            Err(HostError::GroupNotFound(_)) => {
                debug!(pgid = pgid, "Process group already empty");
                Ok(false)
            }
            Err(source) => Err(GroupError::ForcefulTerminationFailed { pgid, source }),
        }
    }

    /// SIGKILL every tracked group, best effort, then let the OS settle.
    ///
    /// The whole set is drained up front, so every group is untracked even
    /// when its signal fails. Individual failures do not stop the sweep;
    /// only the last one is returned. Reaping is not confirmed per group:
    /// the call just waits for the settle period, bounded by `timeout`.
    pub async fn cleanup_all(&self, timeout: Duration) -> GroupResult<()> {
        let deadline = Deadline::after(timeout);

        let pgids: Vec<u32> = self.tracked().drain().map(|(pgid, _)| pgid).collect();
        if pgids.is_empty() {
            return Ok(());
        }

        info!(count = pgids.len(), "Cleaning up tracked process groups");

        let mut last_error = None;
        let mut failed = 0usize;
        for pgid in &pgids {
            if let Err(e) = self.kill_detached(*pgid) {
                warn!(pgid = pgid, error = %e, "Failed to kill process group");
                failed += 1;
                last_error = Some(e);
            }
        }

        tokio::time::sleep(deadline.clamp(self.config.settle_period)).await;

        info!(
            count = pgids.len(),
            failed = failed,
            "Process group cleanup finished"
        );

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// SIGKILL a group known only by id, falling back to its leader pid.
    fn kill_detached(&self, pgid: u32) -> GroupResult<()> {
        match self.isolation.signal_group(pgid, TermSignal::Forceful) {
            Ok(()) => Ok(()),
            Err(group_err) => {
                debug!(pgid = pgid, error = %group_err, "Group kill failed, trying leader pid");
                self.isolation
                    .signal_process(pgid, TermSignal::Forceful)
                    .map_err(|source| GroupError::ForcefulTerminationFailed { pgid, source })
            }
        }
    }
}

/// Wait up to `window` for `child` to exit; `None` if it is still running.
async fn wait_for_exit(
    child: &mut Child,
    pid: u32,
    window: Duration,
) -> GroupResult<Option<ExitStatus>> {
    match tokio::time::timeout(window, child.wait()).await {
        Ok(Ok(status)) => Ok(Some(status)),
        Ok(Err(source)) => Err(GroupError::Wait { pid, source }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use warden_host_api::{HostCapabilities, MockIsolation, SignalTarget};

    fn make_manager() -> (GroupManager, Arc<MockIsolation>) {
        let mock = Arc::new(MockIsolation::new());
        let config = ManagerConfig {
            settle_period: Duration::from_millis(10),
            ..Default::default()
        };
        (GroupManager::new(mock.clone(), config), mock)
    }

    #[test]
    fn register_and_count() {
        let (manager, _mock) = make_manager();

        for pgid in [101, 102, 103] {
            manager.register_group(pgid).unwrap();
        }

        assert_eq!(manager.tracked_count(), 3);
        assert!(manager.is_tracked(102));
        assert!(!manager.is_tracked(104));

        let pgids: Vec<u32> = manager.tracked_groups().iter().map(|g| g.pgid).collect();
        assert_eq!(pgids, vec![101, 102, 103]);
    }

    #[test]
    fn duplicate_registration_is_idempotent() {
        let (manager, _mock) = make_manager();

        manager.register_group(500).unwrap();
        manager.register_group(500).unwrap();

        assert_eq!(manager.tracked_count(), 1);
    }

    #[test]
    fn reserved_groups_rejected() {
        let (manager, _mock) = make_manager();

        assert!(matches!(
            manager.register_group(0),
            Err(GroupError::InvalidArgument(_))
        ));
        assert!(matches!(
            manager.register_group(1),
            Err(GroupError::InvalidArgument(_))
        ));
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn concurrent_registration() {
        let (manager, _mock) = make_manager();
        let manager = Arc::new(manager);

        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    for j in 0..50u32 {
                        manager.register_group(1000 + i * 100 + j).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(manager.tracked_count(), 400);
    }

    #[tokio::test]
    async fn cleanup_empty_is_noop() {
        let (manager, mock) = make_manager();

        manager.cleanup_all(Duration::from_secs(2)).await.unwrap();

        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn cleanup_untracks_everything() {
        let (manager, mock) = make_manager();
        for pgid in [101, 102, 103] {
            manager.register_group(pgid).unwrap();
        }
        assert_eq!(manager.tracked_count(), 3);

        manager.cleanup_all(Duration::from_secs(2)).await.unwrap();

        assert_eq!(manager.tracked_count(), 0);
        let mut signalled: Vec<_> = mock.signals();
        signalled.sort_by_key(|(target, _)| match target {
            SignalTarget::Group(id) | SignalTarget::Process(id) => *id,
        });
        assert_eq!(
            signalled,
            vec![
                (SignalTarget::Group(101), TermSignal::Forceful),
                (SignalTarget::Group(102), TermSignal::Forceful),
                (SignalTarget::Group(103), TermSignal::Forceful),
            ]
        );
    }

    #[tokio::test]
    async fn cleanup_falls_back_to_leader_pid() {
        let (manager, mock) = make_manager();
        mock.set_fail_group_signal(true);
        manager.register_group(777).unwrap();

        manager.cleanup_all(Duration::from_secs(2)).await.unwrap();

        assert_eq!(
            mock.signals(),
            vec![
                (SignalTarget::Group(777), TermSignal::Forceful),
                (SignalTarget::Process(777), TermSignal::Forceful),
            ]
        );
        assert_eq!(manager.tracked_count(), 0);
    }

    #[tokio::test]
    async fn cleanup_reports_last_error_but_untracks() {
        let (manager, mock) = make_manager();
        mock.set_fail_group_signal(true);
        mock.set_fail_process_signal(true);
        for pgid in [101, 102, 103] {
            manager.register_group(pgid).unwrap();
        }

        let result = manager.cleanup_all(Duration::from_secs(2)).await;

        assert!(matches!(
            result,
            Err(GroupError::ForcefulTerminationFailed {
                source: HostError::ProcessNotFound(_),
                ..
            })
        ));
        // Every group was still attempted
        assert_eq!(mock.signals().len(), 6);
        assert_eq!(manager.tracked_count(), 0);
    }

    #[tokio::test]
    async fn cleanup_settle_bounded_by_timeout() {
        let mock = Arc::new(MockIsolation::new());
        let config = ManagerConfig {
            settle_period: Duration::from_secs(30),
            ..Default::default()
        };
        let manager = GroupManager::new(mock, config);
        manager.register_group(4242).unwrap();

        let start = Instant::now();
        manager
            .cleanup_all(Duration::from_millis(50))
            .await
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn sweep_exited_empty_group_is_ok() {
        let (manager, mock) = make_manager();
        mock.set_fail_group_signal(true);
        manager.register_group(2556).unwrap();

        assert!(!manager.sweep_exited(2556).unwrap());

        // Never falls back to the leader pid
        assert_eq!(
            mock.signals(),
            vec![(SignalTarget::Group(2556), TermSignal::Forceful)]
        );
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn sweep_exited_reports_survivors() {
        let (manager, mock) = make_manager();
        manager.register_group(2557).unwrap();
        manager.register_group(2558).unwrap();

        assert!(manager.sweep_exited(2557).unwrap());

        assert_eq!(
            mock.signals(),
            vec![(SignalTarget::Group(2557), TermSignal::Forceful)]
        );
        assert!(!manager.is_tracked(2557));
        assert!(manager.is_tracked(2558));
    }

    #[test]
    fn sweep_exited_without_group_signalling_sends_nothing() {
        let mock =
            Arc::new(MockIsolation::new().with_capabilities(HostCapabilities::best_effort()));
        let manager = GroupManager::new(mock.clone(), ManagerConfig::default());
        manager.register_group(2559).unwrap();

        assert!(!manager.sweep_exited(2559).unwrap());

        assert!(mock.signals().is_empty());
        assert_eq!(manager.tracked_count(), 0);
    }

    #[test]
    fn capability_kind_reported() {
        let (manager, _mock) = make_manager();
        assert_eq!(manager.capability_kind(), IsolationKind::GroupCapable);
        assert_eq!(manager.config().grace_period, Duration::from_secs(2));
    }
}
