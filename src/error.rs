//! Error handling for ovservice.
use std::time::Duration;

use thiserror::Error;

/// Defines all possible errors that can occur while supervising services.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The requested service is not part of the catalog.
    #[error("Unknown service '{0}'")]
    UnknownService(String),

    /// Error spawning a service process.
    #[error("Failed to start service '{service}': {source}")]
    LaunchFailure {
        /// The service name that failed to start.
        service: String,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The service did not exit within the configured stop timeout.
    #[error(
        "Service '{service}' (PID {pid}) did not exit within {waited:?}; leaving it running"
    )]
    StopTimeout {
        /// The service that is still running.
        service: String,
        /// The PID that was signalled.
        pid: u32,
        /// How long the supervisor waited.
        waited: Duration,
    },

    /// Delivering the termination signal failed for a reason other than the process
    /// having already exited.
    #[error("Failed to signal service '{service}' (PID {pid}): {source}")]
    SignalFailure {
        /// The service being stopped.
        service: String,
        /// The PID that was signalled.
        pid: u32,
        /// The errno returned by `kill(2)`.
        #[source]
        source: nix::errno::Errno,
    },

    /// More than one live process carries the service's launch fingerprint.
    ///
    /// Only ever reported as a warning. Status and start use `pid`; stop
    /// terminates every match.
    #[error("Service '{service}' matches several live processes: PID {pid} and {others:?}")]
    AmbiguousMatch {
        /// The service with several matches.
        service: String,
        /// The PID that was selected.
        pid: u32,
        /// The remaining matching PIDs.
        others: Vec<u32>,
    },

    /// Error for the persisted PID record.
    #[error("PID record error: {0}")]
    PidRecord(#[from] PidRecordError),

    /// The per-service advisory lock could not be taken.
    #[error("Failed to lock service '{service}': {source}")]
    Lock {
        /// The service whose lock failed.
        service: String,
        /// The underlying error that occurred.
        #[source]
        source: std::io::Error,
    },

    /// The catalog handed to the supervisor is inconsistent.
    #[error("Invalid service catalog: {0}")]
    InvalidCatalog(String),

    /// A duration option could not be parsed.
    #[error("Invalid duration value: '{0}'")]
    InvalidDuration(String),
}

impl SupervisorError {
    /// Whether the error stems from bad input rather than a failed operation.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            SupervisorError::UnknownService(_) | SupervisorError::InvalidDuration(_)
        )
    }
}

/// Error type for PID record operations.
#[derive(Debug, Error)]
pub enum PidRecordError {
    /// Error reading or writing the record file.
    #[error("Failed to access PID record: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing or serialising the record.
    #[error("Failed to parse PID record: {0}")]
    Parse(#[from] serde_json::Error),
}
