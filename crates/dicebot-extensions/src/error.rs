//! Extension error types.

use thiserror::Error;

/// Errors raised by the capability registry and activation state.
#[derive(Debug, Error)]
pub enum ExtensionError {
    /// A name or alias is already taken by a registered capability.
    #[error("capability name '{name}' collides with already registered '{existing}'")]
    NameCollision {
        /// The colliding name or alias (lowercased).
        name: String,
        /// The capability that already owns it.
        existing: String,
    },

    /// No registered capability answers to the given name or alias.
    #[error("unknown capability: {0}")]
    UnknownCapability(String),

    /// A capability's storage failed to open or close.
    #[error("storage error for capability {capability}: {message}")]
    Storage {
        /// Capability name.
        capability: String,
        /// Backend-specific message.
        message: String,
    },
}

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;
