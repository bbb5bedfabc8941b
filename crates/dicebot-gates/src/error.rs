//! Gate error types.

use thiserror::Error;

/// Errors raised while building a gate from configuration.
///
/// Gate decisions themselves are never errors; see the verdict types.
#[derive(Debug, Error)]
pub enum GateError {
    /// A censor word list could not be compiled.
    #[error("invalid word list for censor level {level}: {source}")]
    InvalidPattern {
        /// Level whose list failed.
        level: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}

/// Result type for gate construction.
pub type GateResult<T> = Result<T, GateError>;
