//! Per-message trace context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation data attached to one inbound message as it moves through
/// the dispatch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceContext {
    /// Unique id for this dispatch.
    pub request_id: Uuid,
    /// Conversation the message arrived in.
    pub conversation_id: String,
    /// Sender of the message.
    pub sender_id: String,
    /// Platform the message came from.
    pub platform: String,
    /// Command word, once one has been parsed.
    pub command: Option<String>,
    /// When dispatch started.
    pub started_at: DateTime<Utc>,
}

impl TraceContext {
    /// Create a new context for a message.
    #[must_use]
    pub fn new(
        conversation_id: impl Into<String>,
        sender_id: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            sender_id: sender_id.into(),
            platform: platform.into(),
            command: None,
            started_at: Utc::now(),
        }
    }

    /// Record the parsed command word.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Milliseconds since dispatch started.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        // started_at is set at construction, so this never goes negative
        #[allow(clippy::arithmetic_side_effects)]
        let elapsed = Utc::now() - self.started_at;
        elapsed.num_milliseconds()
    }

    /// First eight characters of the request id.
    #[must_use]
    pub fn short_id(&self) -> String {
        let mut id = self.request_id.simple().to_string();
        id.truncate(8);
        id
    }

    /// Tracing span carrying this context's fields.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "dispatch",
            request_id = %self.short_id(),
            conversation_id = %self.conversation_id,
            sender_id = %self.sender_id,
            platform = %self.platform,
            command = self.command.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_has_unique_ids() {
        let a = TraceContext::new("g1", "u1", "QQ");
        let b = TraceContext::new("g1", "u1", "QQ");
        assert_ne!(a.request_id, b.request_id);
        assert!(a.command.is_none());
    }

    #[test]
    fn test_with_command() {
        let ctx = TraceContext::new("g1", "u1", "QQ").with_command("roll");
        assert_eq!(ctx.command.as_deref(), Some("roll"));
    }

    #[test]
    fn test_short_id_len() {
        let ctx = TraceContext::new("g1", "u1", "QQ");
        assert_eq!(ctx.short_id().len(), 8);
    }

    #[test]
    fn test_elapsed_is_non_negative() {
        let ctx = TraceContext::new("g1", "u1", "QQ");
        assert!(ctx.elapsed_ms() >= 0);
    }

    #[test]
    fn test_span_enters() {
        let ctx = TraceContext::new("g1", "u1", "QQ");
        let span = ctx.span();
        let _guard = span.enter();
        tracing::info!("inside dispatch span");
    }
}
