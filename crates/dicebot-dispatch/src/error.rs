//! Dispatch error types.

use dicebot_extensions::ExtensionError;
use dicebot_gates::GateError;
use thiserror::Error;

/// Errors raised while assembling or reconfiguring a dispatcher.
///
/// Per-message problems never surface here: the pipeline logs them and,
/// where appropriate, replies to the sender.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A gate could not be built from configuration.
    #[error(transparent)]
    Gate(#[from] GateError),

    /// Capability registration failed.
    #[error(transparent)]
    Extension(#[from] ExtensionError),
}

/// Result type for dispatcher construction and registration.
pub type DispatchResult<T> = Result<T, DispatchError>;
