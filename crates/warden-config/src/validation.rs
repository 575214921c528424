//! Configuration validation

use crate::schema::RawConfig;
use crate::settings::{DEFAULT_GRACE_PERIOD, DEFAULT_STOP_TIMEOUT};
use thiserror::Error;

/// Upper bound on the settle period; bulk cleanup runs on the shutdown path
pub const MAX_SETTLE_PERIOD_MS: u64 = 10_000;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("[manager] {field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("[manager] settle_period_ms {value} exceeds maximum of {max}")]
    SettleTooLong { value: u64, max: u64 },

    #[error("[run] stop_timeout_ms {stop_timeout_ms} must exceed grace_period_ms {grace_period_ms}")]
    StopTimeoutWithinGrace {
        stop_timeout_ms: u64,
        grace_period_ms: u64,
    },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let manager = &config.manager;

    if manager.grace_period_ms == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            field: "grace_period_ms",
        });
    }

    match manager.settle_period_ms {
        Some(0) => errors.push(ValidationError::ZeroDuration {
            field: "settle_period_ms",
        }),
        Some(value) if value > MAX_SETTLE_PERIOD_MS => {
            errors.push(ValidationError::SettleTooLong {
                value,
                max: MAX_SETTLE_PERIOD_MS,
            })
        }
        _ => {}
    }

    // A stop timeout inside the grace window would never reach SIGKILL
    let grace_period_ms = manager
        .grace_period_ms
        .unwrap_or(DEFAULT_GRACE_PERIOD.as_millis() as u64);
    let stop_timeout_ms = config
        .run
        .stop_timeout_ms
        .unwrap_or(DEFAULT_STOP_TIMEOUT.as_millis() as u64);
    if stop_timeout_ms <= grace_period_ms {
        errors.push(ValidationError::StopTimeoutWithinGrace {
            stop_timeout_ms,
            grace_period_ms,
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawManagerConfig, RawRunConfig};

    fn raw(manager: RawManagerConfig, run: RawRunConfig) -> RawConfig {
        RawConfig {
            config_version: 1,
            manager,
            run,
        }
    }

    #[test]
    fn defaults_are_valid() {
        let errors = validate_config(&raw(Default::default(), Default::default()));
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn zero_durations_rejected() {
        let config = raw(
            RawManagerConfig {
                grace_period_ms: Some(0),
                settle_period_ms: Some(0),
                graceful_signal: None,
            },
            Default::default(),
        );

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ValidationError::ZeroDuration { .. })));
    }

    #[test]
    fn long_settle_rejected() {
        let config = raw(
            RawManagerConfig {
                settle_period_ms: Some(MAX_SETTLE_PERIOD_MS + 1),
                ..Default::default()
            },
            Default::default(),
        );

        let errors = validate_config(&config);
        assert!(matches!(errors[..], [ValidationError::SettleTooLong { .. }]));
    }

    #[test]
    fn stop_timeout_must_leave_room_for_escalation() {
        let config = raw(
            RawManagerConfig {
                grace_period_ms: Some(3000),
                ..Default::default()
            },
            RawRunConfig {
                stop_timeout_ms: Some(3000),
            },
        );

        let errors = validate_config(&config);
        assert!(matches!(
            errors[..],
            [ValidationError::StopTimeoutWithinGrace {
                stop_timeout_ms: 3000,
                grace_period_ms: 3000
            }]
        ));
    }
}
