//! warden - run a command in its own process group
//!
//! Wires together:
//! - Configuration loading
//! - The platform isolation capability
//! - The group manager
//! - Shutdown signal handling
//!
//! `warden run` spawns a command as the leader of a new process group and,
//! on SIGINT/SIGTERM/SIGHUP, tears the whole group down. `warden ps` lists
//! the process table the way a caller would check for survivors.

mod ps;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::{ExitCode, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use warden_config::{load_config_or_default, Settings};
use warden_core::{GroupError, GroupManager};
use warden_host_unix::platform_capability;
use warden_util::{default_config_path, format_duration};

/// warden - process-group lifecycle manager
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Run commands in isolated process groups and tear them down without orphans", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/warden/config.toml)
    #[arg(short, long, env = "WARDEN_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Spawn a command in its own process group and stop it on shutdown
    Run {
        /// Overall deadline for stopping the command, in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// List processes from the live process table
    Ps {
        /// Only members of this process group
        #[arg(long, conflicts_with_all = ["descendants", "name"])]
        group: Option<u32>,

        /// Only descendants of this pid
        #[arg(long, conflicts_with = "name")]
        descendants: Option<u32>,

        /// Only processes whose command contains this text
        #[arg(long)]
        name: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

enum Outcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    Signalled(&'static str),
}

async fn run(settings: Settings, argv: Vec<String>, timeout: Duration) -> Result<ExitCode> {
    let manager = GroupManager::new(platform_capability(), settings.manager.clone());

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        // Held open so the child sees EOF when we stop it
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    manager.prepare(&mut cmd);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", argv[0]))?;
    let pgid = manager.register(&child)?;

    info!(
        pgid = pgid,
        command = %argv[0],
        isolation = %manager.capability_kind(),
        "Command started"
    );

    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        name = shutdown_signal() => Outcome::Signalled(name?),
    };

    let code = match outcome {
        Outcome::Exited(status) => {
            let status = status.context("Failed to wait for command")?;
            info!(pgid = pgid, status = %status, "Command exited");
            // The leader is reaped; only its group may be signalled now
            if let Err(e) = manager.sweep_exited(pgid) {
                warn!(error = %e, "Failed to sweep process group");
            }
            exit_code(status)
        }
        Outcome::Signalled(name) => {
            info!(
                signal = name,
                pgid = pgid,
                timeout = %format_duration(timeout),
                "Shutdown requested, stopping command"
            );
            match manager.terminate(&mut child, timeout).await {
                Ok(()) => {}
                Err(e @ GroupError::TerminationTimeout { .. }) => {
                    warn!(error = %e, "Command still running at deadline");
                }
                Err(e) => error!(error = %e, "Failed to stop command"),
            }
            ExitCode::from(130)
        }
    };

    // Anything else still registered with the manager
    if let Err(e) = manager.cleanup_all(timeout).await {
        warn!(error = %e, "Cleanup of remaining process groups incomplete");
    }

    Ok(code)
}

fn exit_code(status: std::process::ExitStatus) -> ExitCode {
    if let Some(code) = status.code() {
        return ExitCode::from(code.clamp(0, 255) as u8);
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return ExitCode::from((128 + sig).clamp(0, 255) as u8);
        }
    }

    ExitCode::FAILURE
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
        _ = sighup.recv() => "SIGHUP",
    };
    Ok(name)
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    Ok("Ctrl-C")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let settings = load_config_or_default(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    match args.command {
        Cmd::Run { timeout_ms, argv } => {
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(settings.run.stop_timeout);
            if timeout <= settings.manager.grace_period {
                warn!(
                    timeout = %format_duration(timeout),
                    grace_period = %format_duration(settings.manager.grace_period),
                    "Stop timeout is within the grace period; SIGKILL will never be sent"
                );
            }
            if argv.is_empty() {
                bail!("No command given");
            }
            run(settings, argv, timeout).await
        }
        Cmd::Ps {
            group,
            descendants,
            name,
            json,
        } => {
            let filter = match (group, descendants, name) {
                (Some(pgid), _, _) => ps::Filter::Group(pgid),
                (_, Some(pid), _) => ps::Filter::Descendants(pid),
                (_, _, Some(name)) => ps::Filter::Name(name),
                _ => ps::Filter::All,
            };
            let records = ps::collect(&filter)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print!("{}", ps::render_table(&records));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
