//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while configuring or initializing telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A [`crate::LogConfig`] value could not be turned into a working
    /// filter or writer (malformed directive, unwritable log file path).
    #[error("telemetry configuration error: {0}")]
    ConfigError(String),

    /// A global subscriber was already installed (e.g. `setup_logging`
    /// called twice in the same process, or a test harness installed one
    /// first).
    #[error("telemetry initialization error: {0}")]
    InitError(String),

    /// Failure opening or creating a log file target.
    #[error("telemetry io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
