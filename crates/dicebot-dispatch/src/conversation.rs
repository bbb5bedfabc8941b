//! Conversation records and the store that owns them.
//!
//! Each record sits behind its own `tokio::sync::Mutex`; the pipeline holds
//! it for the whole run of one message so messages in the same conversation
//! are handled strictly one after another.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dicebot_core::{ConversationId, InboundMessage, Platform, UserId};
use dicebot_extensions::{ActivationSnapshot, ActivationState};
use dicebot_gates::RateLimitState;
use tokio::sync::Mutex;
use tracing::info;

/// What the bot remembers about one member of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberRecord {
    /// Last seen display name.
    pub nickname: String,
    /// When the member last ran a command successfully.
    pub last_command_at: Option<DateTime<Utc>>,
}

/// State of one conversation.
#[derive(Debug)]
pub struct Conversation {
    /// Conversation id.
    pub id: ConversationId,
    /// Platform the conversation lives on.
    pub platform: Platform,
    /// One-to-one chat with the bot.
    pub private: bool,
    /// Whether the bot is switched on here.
    pub bot_on: bool,
    /// Which capabilities are active, in priority order.
    pub activation: ActivationState,
    /// Who invited the bot, if known.
    pub inviter: Option<UserId>,
    /// Accounts known to be other bots.
    pub bot_list: BTreeSet<UserId>,
    /// Per-member records.
    pub members: HashMap<UserId, MemberRecord>,
    /// Rate-limit buckets for this conversation.
    pub rate_limit: RateLimitState,
    /// Whether a story log is being recorded.
    pub story_log_on: bool,
    /// Last successful command in this conversation.
    pub last_command_at: Option<DateTime<Utc>>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Fresh record for the conversation `message` arrived in.
    #[must_use]
    pub fn from_message(message: &InboundMessage, bot_on: bool) -> Self {
        Self {
            id: message.conversation_id.clone(),
            platform: message.platform.clone(),
            private: message.is_private(),
            bot_on,
            activation: ActivationState::new(),
            inviter: None,
            bot_list: BTreeSet::new(),
            members: HashMap::new(),
            rate_limit: RateLimitState::new(),
            story_log_on: false,
            last_command_at: None,
            created_at: Utc::now(),
        }
    }

    /// Restore activation from a persisted snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: ActivationSnapshot) -> Self {
        self.activation = ActivationState::from_snapshot(snapshot);
        self
    }

    /// Record who invited the bot.
    #[must_use]
    pub fn with_inviter(mut self, inviter: UserId) -> Self {
        self.inviter = Some(inviter);
        self
    }

    /// Bot-on for eligibility purposes: private chats always count as on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bot_on || self.private
    }

    /// Whether `user` is on this conversation's bot list.
    #[must_use]
    pub fn is_known_bot(&self, user: &UserId) -> bool {
        self.bot_list.contains(user)
    }

    /// Note a successful command by `sender`.
    pub fn record_command(&mut self, sender: &UserId, nickname: &str, at: DateTime<Utc>) {
        let member = self.members.entry(sender.clone()).or_default();
        member.nickname = nickname.to_string();
        member.last_command_at = Some(at);
        self.last_command_at = Some(at);
    }
}

/// All known conversations.
#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: DashMap<ConversationId, Arc<Mutex<Conversation>>>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for `message`'s conversation, creating it when
    /// unseen. Returns the record and whether it was just created.
    pub fn get_or_create(
        &self,
        message: &InboundMessage,
        bot_on: bool,
    ) -> (Arc<Mutex<Conversation>>, bool) {
        if let Some(existing) = self.conversations.get(&message.conversation_id) {
            return (Arc::clone(existing.value()), false);
        }
        let mut created = false;
        let record = self
            .conversations
            .entry(message.conversation_id.clone())
            .or_insert_with(|| {
                created = true;
                info!(
                    conversation_id = %message.conversation_id,
                    platform = %message.platform,
                    private = message.is_private(),
                    bot_on,
                    "New conversation"
                );
                Arc::new(Mutex::new(Conversation::from_message(message, bot_on)))
            });
        (Arc::clone(record.value()), created)
    }

    /// Insert a pre-built record, replacing any existing one.
    pub fn insert(&self, conversation: Conversation) -> Arc<Mutex<Conversation>> {
        let id = conversation.id.clone();
        let record = Arc::new(Mutex::new(conversation));
        self.conversations.insert(id, Arc::clone(&record));
        record
    }

    /// Look up a record.
    #[must_use]
    pub fn get(&self, id: &ConversationId) -> Option<Arc<Mutex<Conversation>>> {
        self.conversations.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Known conversation ids.
    #[must_use]
    pub fn ids(&self) -> Vec<ConversationId> {
        let mut ids: Vec<ConversationId> = self.conversations.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of known conversations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    /// Whether no conversation is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebot_test::{group_message, private_message};

    #[tokio::test]
    async fn test_get_or_create_creates_once() {
        let store = ConversationStore::new();
        let msg = group_message("QQ:2", "hi");
        let (first, created) = store.get_or_create(&msg, true);
        assert!(created);
        let (second, created) = store.get_or_create(&msg, false);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.lock().await.bot_on);
        assert_eq!(store.len(), 1);
        assert_eq!(store.ids(), vec![msg.conversation_id.clone()]);
    }

    #[tokio::test]
    async fn test_private_counts_as_active() {
        let store = ConversationStore::new();
        let (conv, _) = store.get_or_create(&private_message("QQ:2", "hi"), false);
        let conv = conv.lock().await;
        assert!(conv.private);
        assert!(conv.is_active());
    }

    #[tokio::test]
    async fn test_insert_replaces_record() {
        let store = ConversationStore::new();
        let msg = group_message("QQ:2", "hi");
        store.get_or_create(&msg, true);
        let record = Conversation::from_message(&msg, false).with_inviter(UserId::new("QQ:9"));
        store.insert(record);
        let conv = store.get(&msg.conversation_id).unwrap();
        let conv = conv.lock().await;
        assert!(!conv.bot_on);
        assert_eq!(conv.inviter, Some(UserId::new("QQ:9")));
    }

    #[test]
    fn test_record_command_updates_member_and_conversation() {
        let msg = group_message("QQ:2", ".r");
        let mut conv = Conversation::from_message(&msg, true);
        let now = Utc::now();
        conv.record_command(&msg.sender.id, "bob", now);
        assert_eq!(conv.members[&msg.sender.id].last_command_at, Some(now));
        assert_eq!(conv.last_command_at, Some(now));
    }
}
