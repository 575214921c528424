//! Error types for group management

use std::time::Duration;
use thiserror::Error;
use warden_host_api::HostError;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Process group {pgid} did not exit within {timeout:?}; forceful termination not attempted")]
    TerminationTimeout { pgid: u32, timeout: Duration },

    #[error("Forceful termination of process group {pgid} failed: {source}")]
    ForcefulTerminationFailed {
        pgid: u32,
        #[source]
        source: HostError,
    },

    #[error("Process group {pgid} did not die after forceful termination (deadline {timeout:?})")]
    ReapTimeout { pgid: u32, timeout: Duration },

    #[error("Waiting for process {pid} failed: {source}")]
    Wait {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

impl GroupError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

pub type GroupResult<T> = Result<T, GroupError>;
