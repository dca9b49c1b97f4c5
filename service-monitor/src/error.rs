//! Error types for the service monitor

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or validating the monitor configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file found (tried {0})")]
    NotFound(String),

    #[error("failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised while diagnosing or restarting a service
///
/// These never escape the supervisor loop; they are logged and folded into
/// the service's health record.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to run {command}: {source}")]
    Command {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate process {pid}: {reason}")]
    Terminate { pid: u32, reason: String },

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("port {0} still bound after termination")]
    PortStillBound(u16),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
