//! Daemon error type and process exit codes.

use intrusion_monitor_core::error::{ConfigError, MonitorError, SinkError};
use intrusion_monitor_watchdog::{TailerError, WatchdogError};

/// Process exit codes.
pub mod exit_code {
    /// Normal exit (including a clean signal-triggered shutdown).
    pub const OK: i32 = 0;
    /// Uncaught fatal error.
    pub const FATAL: i32 = 1;
    /// The authentication log does not exist.
    pub const LOG_FILE_MISSING: i32 = 2;
    /// The authentication log exists but cannot be read.
    pub const LOG_FILE_UNREADABLE: i32 = 3;
    /// Configuration could not be loaded or failed validation.
    pub const CONFIG: i32 = 4;
    /// The sink did not answer the startup connectivity check.
    pub const SINK_UNREACHABLE: i32 = 5;
}

/// Errors that terminate the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("log file not found: {path}")]
    LogFileMissing { path: String },

    #[error("log file not readable: {path}")]
    LogFileUnreadable { path: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("sink unreachable at startup: {0}")]
    SinkUnreachable(String),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl DaemonError {
    /// Exit code reported to the calling process.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::LogFileMissing { .. } => exit_code::LOG_FILE_MISSING,
            Self::LogFileUnreadable { .. } => exit_code::LOG_FILE_UNREADABLE,
            Self::Config(_) => exit_code::CONFIG,
            Self::SinkUnreachable(_) => exit_code::SINK_UNREACHABLE,
            Self::Fatal(_) => exit_code::FATAL,
        }
    }
}

impl From<ConfigError> for DaemonError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<MonitorError> for DaemonError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::Config(e) => e.into(),
            MonitorError::Sink(SinkError::Unreachable(reason)) => Self::SinkUnreachable(reason),
            other => Self::Fatal(other.into()),
        }
    }
}

impl From<WatchdogError> for DaemonError {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::Tailer(TailerError::NotFound { path }) => Self::LogFileMissing { path },
            WatchdogError::Tailer(TailerError::PermissionDenied { path }) => {
                Self::LogFileUnreadable { path }
            }
            WatchdogError::SinkUnreachableAtStartup(reason) => Self::SinkUnreachable(reason),
            WatchdogError::Config(e) => e.into(),
            other => Self::Fatal(other.into()),
        }
    }
}
