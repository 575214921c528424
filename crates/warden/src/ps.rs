//! `warden ps`: structured process listing

use anyhow::Result;
use std::fmt::Write;
use warden_host_unix::{process_table, ProcessRecord};

/// Which slice of the process table to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    All,
    Group(u32),
    Descendants(u32),
    Name(String),
}

pub fn collect(filter: &Filter) -> Result<Vec<ProcessRecord>> {
    let records = match filter {
        Filter::All => process_table::list_processes()?,
        Filter::Group(pgid) => process_table::group_members(*pgid)?,
        Filter::Descendants(pid) => process_table::descendants_of(*pid)?,
        Filter::Name(name) => process_table::find_by_name(name)?,
    };
    Ok(records)
}

pub fn render_table(records: &[ProcessRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>8} {:>8} {:>8} S COMMAND", "PID", "PPID", "PGID");
    for r in records {
        let _ = writeln!(
            out,
            "{:>8} {:>8} {:>8} {} {}",
            r.pid, r.ppid, r.pgid, r.state, r.command
        );
    }
    out
}
