//! Mock implementations for testing.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dicebot_core::{ConversationId, InboundMessage, ReplyError, ReplyResult, ReplySurface};

/// One call captured by [`RecordingReplySurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivered {
    /// `reply_to_sender`.
    ToSender {
        /// Conversation of the original message.
        conversation: ConversationId,
        /// Reply text.
        text: String,
    },
    /// `send_to_conversation`.
    ToConversation {
        /// Target conversation.
        conversation: ConversationId,
        /// Message text.
        text: String,
    },
    /// `notify_operators`.
    Notice(String),
    /// `leave_conversation`.
    Left(ConversationId),
}

impl Delivered {
    /// Text carried by the call, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::ToSender { text, .. } | Self::ToConversation { text, .. } | Self::Notice(text) => {
                Some(text)
            },
            Self::Left(_) => None,
        }
    }
}

/// Reply surface that records every call.
///
/// Uses `std::sync::Mutex` so assertions can read it without a runtime.
#[derive(Debug, Clone, Default)]
pub struct RecordingReplySurface {
    delivered: Arc<Mutex<Vec<Delivered>>>,
    fail_sends: bool,
}

impl RecordingReplySurface {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder whose sends fail after being recorded.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    fn push(&self, item: Delivered) -> ReplyResult<()> {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.push(item);
        }
        if self.fail_sends {
            return Err(ReplyError::SendFailed("recording surface set to fail".into()));
        }
        Ok(())
    }

    /// Everything captured so far, in call order.
    #[must_use]
    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Texts of `reply_to_sender` calls.
    #[must_use]
    pub fn replies(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::ToSender { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Texts of `send_to_conversation` calls.
    #[must_use]
    pub fn conversation_posts(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::ToConversation { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Texts of `notify_operators` calls.
    #[must_use]
    pub fn notices(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Conversations the bot was asked to leave.
    #[must_use]
    pub fn left(&self) -> Vec<ConversationId> {
        self.delivered()
            .into_iter()
            .filter_map(|d| match d {
                Delivered::Left(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Forget everything captured so far.
    pub fn clear(&self) {
        if let Ok(mut guard) = self.delivered.lock() {
            guard.clear();
        }
    }
}

#[async_trait]
impl ReplySurface for RecordingReplySurface {
    async fn reply_to_sender(&self, message: &InboundMessage, text: &str) -> ReplyResult<()> {
        self.push(Delivered::ToSender {
            conversation: message.conversation_id.clone(),
            text: text.to_string(),
        })
    }

    async fn notify_operators(&self, text: &str) -> ReplyResult<()> {
        self.push(Delivered::Notice(text.to_string()))
    }

    async fn send_to_conversation(
        &self,
        conversation: &ConversationId,
        text: &str,
    ) -> ReplyResult<()> {
        self.push(Delivered::ToConversation {
            conversation: conversation.clone(),
            text: text.to_string(),
        })
    }

    async fn leave_conversation(&self, conversation: &ConversationId) -> ReplyResult<()> {
        self.push(Delivered::Left(conversation.clone()))
    }
}
