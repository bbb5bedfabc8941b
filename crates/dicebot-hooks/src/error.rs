//! Hook invocation errors.

use thiserror::Error;

use crate::point::HookPoint;

/// Errors raised while invoking a capability hook or handler.
#[derive(Debug, Error)]
pub enum HookError {
    /// The scripting worker did not answer in time.
    #[error("{capability}:{point} timed out after {timeout_ms}ms")]
    Timeout {
        /// Capability name.
        capability: String,
        /// Hook that was running.
        point: HookPoint,
        /// Configured bound in milliseconds.
        timeout_ms: u64,
    },

    /// The hook panicked on the scripting worker.
    #[error("{capability}:{point} panicked: {message}")]
    Panicked {
        /// Capability name.
        capability: String,
        /// Hook that was running.
        point: HookPoint,
        /// Panic payload rendered as text.
        message: String,
    },

    /// The scripting worker has shut down.
    #[error("scripting worker is gone")]
    WorkerClosed,

    /// The hook could not run (for example its storage failed to open).
    #[error("{capability}:{point} failed: {message}")]
    HandlerFailed {
        /// Capability name.
        capability: String,
        /// Hook that was running.
        point: HookPoint,
        /// What went wrong.
        message: String,
    },

    /// Scripting is switched off, so scripted hooks are skipped.
    #[error("scripting is disabled, skipping {capability}:{point}")]
    Disabled {
        /// Capability name.
        capability: String,
        /// Hook that was skipped.
        point: HookPoint,
    },
}

/// Result type for hook invocation.
pub type HookResult<T> = Result<T, HookError>;
