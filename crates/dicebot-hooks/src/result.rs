//! Timed hook execution records.

use crate::point::HookPoint;

/// How a hook invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookExecutionResult<T> {
    /// The hook returned a value.
    Success(T),
    /// The hook panicked or could not run.
    Failure {
        /// Error message.
        error: String,
    },
    /// The scripting worker did not answer in time.
    Timeout {
        /// Configured bound in milliseconds.
        timeout_ms: u64,
    },
    /// The hook was not run.
    Skipped {
        /// Reason for skipping.
        reason: String,
    },
}

impl<T> HookExecutionResult<T> {
    /// Check if execution was successful.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The value, if execution was successful.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            Self::Failure { .. } | Self::Timeout { .. } | Self::Skipped { .. } => None,
        }
    }
}

/// Record of a single hook invocation.
#[derive(Debug, Clone)]
pub struct HookExecution<T> {
    /// Capability that owns the hook.
    pub capability: String,
    /// Which hook ran.
    pub point: HookPoint,
    /// Wall time spent, including queueing for scripted hooks.
    pub duration_ms: u64,
    /// Outcome.
    pub result: HookExecutionResult<T>,
}

impl<T> HookExecution<T> {
    /// The value, if execution was successful.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.result.into_value()
    }

    /// Whether the hook failed or timed out (skips are not failures).
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self.result,
            HookExecutionResult::Failure { .. } | HookExecutionResult::Timeout { .. }
        )
    }
}
