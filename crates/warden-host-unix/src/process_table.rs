//! Structured enumeration of the live process table
//!
//! Diagnostics only: the group manager never consults the process table to
//! decide anything. These helpers exist so that a caller (or a test) can
//! check after the fact whether a torn-down group really left no survivors.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use warden_host_api::HostResult;

/// One entry of the process table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub pgid: u32,
    /// Single-letter kernel state (`R`, `S`, `Z`, ...)
    pub state: char,
    pub command: String,
}

impl ProcessRecord {
    /// Exited but not yet reaped
    pub fn is_zombie(&self) -> bool {
        self.state == 'Z' || self.state == 'X'
    }
}

/// Parse the contents of `/proc/<pid>/stat`.
///
/// Format: `pid (comm) state ppid pgrp ...`. `comm` may itself contain
/// spaces and parentheses, so it is delimited by the first `(` and the
/// last `)`.
pub fn parse_stat(content: &str) -> Option<ProcessRecord> {
    let open = content.find('(')?;
    let close = content.rfind(')')?;
    if close < open {
        return None;
    }

    let pid = content[..open].trim().parse().ok()?;
    let command = content[open + 1..close].to_string();

    let mut fields = content[close + 1..].split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid = fields.next()?.parse().ok()?;
    let pgid = fields.next()?.parse().ok()?;

    Some(ProcessRecord {
        pid,
        ppid,
        pgid,
        state,
        command,
    })
}

/// Snapshot every process visible in `/proc`
#[cfg(target_os = "linux")]
pub fn list_processes() -> HostResult<Vec<ProcessRecord>> {
    let mut records = Vec::new();

    for entry in std::fs::read_dir("/proc")?.flatten() {
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };

        // The process may exit between readdir and read
        let Ok(content) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) else {
            continue;
        };

        if let Some(record) = parse_stat(&content) {
            records.push(record);
        }
    }

    records.sort_by_key(|r| r.pid);
    Ok(records)
}

#[cfg(not(target_os = "linux"))]
pub fn list_processes() -> HostResult<Vec<ProcessRecord>> {
    Err(warden_host_api::HostError::Unsupported(
        "process enumeration without /proc".into(),
    ))
}

/// All processes currently in group `pgid`, zombies included
pub fn group_members(pgid: u32) -> HostResult<Vec<ProcessRecord>> {
    Ok(list_processes()?
        .into_iter()
        .filter(|r| r.pgid == pgid)
        .collect())
}

/// Members of group `pgid` that are still running
pub fn live_group_members(pgid: u32) -> HostResult<Vec<ProcessRecord>> {
    Ok(group_members(pgid)?
        .into_iter()
        .filter(|r| !r.is_zombie())
        .collect())
}

/// Every descendant of `pid` (children, grandchildren, ...), excluding `pid` itself
pub fn descendants_of(pid: u32) -> HostResult<Vec<ProcessRecord>> {
    Ok(collect_descendants(list_processes()?, pid))
}

fn collect_descendants(records: Vec<ProcessRecord>, root: u32) -> Vec<ProcessRecord> {
    let mut children: HashMap<u32, Vec<ProcessRecord>> = HashMap::new();
    for record in records {
        children.entry(record.ppid).or_default().push(record);
    }

    let mut result = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(parent) = queue.pop_front() {
        if let Some(kids) = children.remove(&parent) {
            for kid in kids {
                queue.push_back(kid.pid);
                result.push(kid);
            }
        }
    }

    result
}

/// Processes whose command name contains `name`
pub fn find_by_name(name: &str) -> HostResult<Vec<ProcessRecord>> {
    Ok(list_processes()?
        .into_iter()
        .filter(|r| r.command.contains(name))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, ppid: u32) -> ProcessRecord {
        ProcessRecord {
            pid,
            ppid,
            pgid: pid,
            state: 'S',
            command: format!("proc{}", pid),
        }
    }

    #[test]
    fn parse_simple_stat() {
        let stat = "4242 (sleep) S 4200 4242 4200 0 -1 4194304 98 0 0 0 0 0";
        let rec = parse_stat(stat).unwrap();
        assert_eq!(rec.pid, 4242);
        assert_eq!(rec.ppid, 4200);
        assert_eq!(rec.pgid, 4242);
        assert_eq!(rec.state, 'S');
        assert_eq!(rec.command, "sleep");
        assert!(!rec.is_zombie());
    }

    #[test]
    fn parse_stat_with_awkward_command() {
        let stat = "17 (my (odd) prog) Z 1 17 17 0 -1";
        let rec = parse_stat(stat).unwrap();
        assert_eq!(rec.command, "my (odd) prog");
        assert_eq!(rec.ppid, 1);
        assert!(rec.is_zombie());
    }

    #[test]
    fn parse_stat_rejects_garbage() {
        assert!(parse_stat("").is_none());
        assert!(parse_stat("12 no-parens S 1 1").is_none());
        assert!(parse_stat("12 (truncated) S").is_none());
    }

    #[test]
    fn descendants_walk_all_generations() {
        let records = vec![
            record(10, 1),
            record(11, 10),
            record(12, 11),
            record(13, 10),
            record(20, 1),
        ];

        let mut pids: Vec<u32> = collect_descendants(records, 10)
            .into_iter()
            .map(|r| r.pid)
            .collect();
        pids.sort();
        assert_eq!(pids, vec![11, 12, 13]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn list_includes_self() {
        let me = std::process::id();
        let records = list_processes().unwrap();
        let mine = records.iter().find(|r| r.pid == me).unwrap();
        assert_eq!(mine.pgid, nix::unistd::getpgrp().as_raw() as u32);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn spawned_child_is_a_descendant() {
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .unwrap();
        let pid = child.id();

        let found = descendants_of(std::process::id()).unwrap();
        assert!(found.iter().any(|r| r.pid == pid));
        assert!(find_by_name("sleep").unwrap().iter().any(|r| r.pid == pid));

        child.kill().unwrap();
        child.wait().unwrap();
    }
}
