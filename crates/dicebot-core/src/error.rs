//! Error types for the outbound reply surface.

use thiserror::Error;

/// Errors returned by a [`ReplySurface`](crate::ReplySurface) implementation.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// The adapter is not connected.
    #[error("adapter not connected")]
    NotConnected,

    /// Sending a message failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The adapter cannot perform this operation (e.g. leaving a private chat).
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Convenience alias for reply operations.
pub type ReplyResult<T> = Result<T, ReplyError>;
