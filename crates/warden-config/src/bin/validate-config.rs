//! Config validation CLI tool
//!
//! Validates a warden configuration file and reports any errors.

use std::path::PathBuf;
use std::process::ExitCode;
use warden_config::ConfigError;
use warden_util::{default_config_path, format_duration};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a warden configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match warden_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", warden_config::CURRENT_CONFIG_VERSION);
            println!(
                "  Grace period: {}",
                format_duration(settings.manager.grace_period)
            );
            println!(
                "  Settle period: {}",
                format_duration(settings.manager.settle_period)
            );
            println!("  Graceful SIGTERM: {}", settings.manager.graceful_signal);
            println!(
                "  Stop timeout: {}",
                format_duration(settings.run.stop_timeout)
            );
            ExitCode::SUCCESS
        }
        Err(ConfigError::ValidationFailed { errors }) => {
            eprintln!("✗ Configuration has {} error(s):", errors.len());
            for error in errors {
                eprintln!("  - {}", error);
            }
            ExitCode::from(1)
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::from(1)
        }
    }
}
