//! Outbound reply surface.
//!
//! Handlers never talk to adapters directly. They return [`Reply`] values,
//! and the pipeline hands them to a [`ReplySurface`] via [`deliver`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ReplyResult;
use crate::ids::ConversationId;
use crate::message::InboundMessage;

/// One outbound action produced while handling a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Reply {
    /// Answer the sender where the message came from.
    ToSender(String),
    /// Post into the message's conversation.
    ToConversation(String),
    /// Tell the bot operators.
    NotifyOperators(String),
}

impl Reply {
    /// Shorthand for [`Reply::ToSender`].
    #[must_use]
    pub fn sender(text: impl Into<String>) -> Self {
        Self::ToSender(text.into())
    }

    /// Text carried by this reply.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::ToSender(t) | Self::ToConversation(t) | Self::NotifyOperators(t) => t,
        }
    }
}

/// Sends messages back out through the platform adapter.
#[async_trait]
pub trait ReplySurface: Send + Sync {
    /// Reply to the sender of `message` (in the same conversation).
    async fn reply_to_sender(&self, message: &InboundMessage, text: &str) -> ReplyResult<()>;

    /// Notify the bot operators out of band.
    async fn notify_operators(&self, text: &str) -> ReplyResult<()>;

    /// Post into an arbitrary conversation.
    async fn send_to_conversation(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> ReplyResult<()>;

    /// Make the bot leave a conversation.
    async fn leave_conversation(&self, conversation: &ConversationId) -> ReplyResult<()>;
}

/// Deliver replies in order. Failures are logged, never propagated.
pub async fn deliver(surface: &dyn ReplySurface, message: &InboundMessage, replies: &[Reply]) {
    for reply in replies {
        let result = match reply {
            Reply::ToSender(text) => surface.reply_to_sender(message, text).await,
            Reply::ToConversation(text) => {
                surface
                    .send_to_conversation(&message.conversation_id, text)
                    .await
            },
            Reply::NotifyOperators(text) => surface.notify_operators(text).await,
        };
        if let Err(e) = result {
            warn!(
                conversation_id = %message.conversation_id,
                error = %e,
                "Failed to deliver reply"
            );
        }
    }
}
