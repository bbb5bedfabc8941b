//! Normalized inbound message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ConversationId, Platform, UserId};

/// Whether a message arrived in a group conversation or a private chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Multi-member conversation.
    #[default]
    Group,
    /// One-to-one chat with the bot.
    Private,
}

/// The sender's role inside the conversation, as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    /// Ordinary member.
    #[default]
    Member,
    /// Conversation administrator.
    Admin,
    /// Conversation owner.
    Owner,
}

/// Who sent a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Platform user id.
    pub id: UserId,
    /// Display name at the time of sending.
    pub nickname: String,
    /// Role in the conversation.
    #[serde(default)]
    pub role: SenderRole,
}

impl Sender {
    /// Create an ordinary member sender.
    #[must_use]
    pub fn new(id: UserId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            role: SenderRole::Member,
        }
    }

    /// Set the sender role.
    #[must_use]
    pub fn with_role(mut self, role: SenderRole) -> Self {
        self.role = role;
        self
    }
}

/// A message as handed to the dispatch core by a platform adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// When the platform says the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Platform tag of the producing adapter.
    pub platform: Platform,
    /// Group or private.
    pub kind: MessageKind,
    /// Who sent it.
    pub sender: Sender,
    /// Raw text with platform markup already stripped.
    pub text: String,
    /// Users mentioned in the message, in order of appearance.
    #[serde(default)]
    pub mentions: Vec<UserId>,
}

impl InboundMessage {
    /// Start building a group message (defaults: now, no mentions).
    #[must_use]
    pub fn builder(
        conversation_id: ConversationId,
        platform: Platform,
        sender: Sender,
        text: impl Into<String>,
    ) -> InboundMessageBuilder {
        InboundMessageBuilder {
            timestamp: Utc::now(),
            conversation_id,
            platform,
            kind: MessageKind::Group,
            sender,
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    /// Whether this is a private chat message.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.kind == MessageKind::Private
    }

    /// Whether `user` is among the mentioned users.
    #[must_use]
    pub fn mentions_user(&self, user: &UserId) -> bool {
        self.mentions.iter().any(|m| m == user)
    }

    /// Whether someone other than `me` is mentioned.
    #[must_use]
    pub fn mentions_someone_else(&self, me: &UserId) -> bool {
        self.mentions.iter().any(|m| m != me)
    }
}

/// Builder for [`InboundMessage`].
#[derive(Debug)]
pub struct InboundMessageBuilder {
    timestamp: DateTime<Utc>,
    conversation_id: ConversationId,
    platform: Platform,
    kind: MessageKind,
    sender: Sender,
    text: String,
    mentions: Vec<UserId>,
}

impl InboundMessageBuilder {
    /// Mark the message as a private chat message.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.kind = MessageKind::Private;
        self
    }

    /// Add a mentioned user.
    #[must_use]
    pub fn mention(mut self, user: UserId) -> Self {
        self.mentions.push(user);
        self
    }

    /// Override the timestamp (defaults to now).
    #[must_use]
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Consume the builder and produce an [`InboundMessage`].
    #[must_use]
    pub fn build(self) -> InboundMessage {
        InboundMessage {
            timestamp: self.timestamp,
            conversation_id: self.conversation_id,
            platform: self.platform,
            kind: self.kind,
            sender: self.sender,
            text: self.text,
            mentions: self.mentions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InboundMessageBuilder {
        InboundMessage::builder(
            ConversationId::new("QQ-Group:1"),
            Platform::new("QQ"),
            Sender::new(UserId::new("QQ:2"), "bob"),
            ".help",
        )
    }

    #[test]
    fn test_builder_defaults_to_group() {
        let msg = sample().build();
        assert_eq!(msg.kind, MessageKind::Group);
        assert!(!msg.is_private());
        assert!(msg.mentions.is_empty());
        assert_eq!(msg.sender.role, SenderRole::Member);
    }

    #[test]
    fn test_mentions() {
        let me = UserId::new("QQ:100");
        let msg = sample().mention(me.clone()).build();
        assert!(msg.mentions_user(&me));
        assert!(!msg.mentions_someone_else(&me));

        let msg = sample().mention(UserId::new("QQ:3")).private().build();
        assert!(msg.is_private());
        assert!(msg.mentions_someone_else(&me));
    }
}
