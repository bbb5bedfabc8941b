//! Telemetry error types.

use thiserror::Error;

/// Errors that can occur while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The log configuration is malformed (bad level or directive).
    #[error("invalid log configuration: {0}")]
    ConfigError(String),

    /// A global subscriber is already installed, or installation failed.
    #[error("cannot install subscriber: {0}")]
    InitError(String),

    /// The log directory could not be prepared.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
