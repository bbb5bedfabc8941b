//! Ban list and the ban-list gate.
//!
//! Users and conversations share one list, keyed by their id string. Scores
//! accumulate from penalties (spam, censored words) and decay over time; a
//! score past the warn or ban threshold moves the entry's rank. Trusted
//! entries never change rank through scoring.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dicebot_config::BanSection;
use dicebot_core::{BanRank, InboundMessage, Privilege};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::action::GateAction;

/// Role level at and above which a banned sender makes the bot leave under
/// the quit-if-admin behaviours (inviter and up).
const PRIVILEGED_ROLE_LEVEL: i32 = 40;

// ---------------------------------------------------------------------------
// Ban list
// ---------------------------------------------------------------------------

/// One offence on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    /// When it happened.
    pub at: DateTime<Utc>,
    /// Where it happened (conversation id or a subsystem name).
    pub place: String,
    /// Why.
    pub reason: String,
}

/// A ban-list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanEntry {
    /// User or conversation id.
    pub id: String,
    /// Display name at the time of the last update.
    pub name: String,
    /// Accumulated penalty score.
    pub score: i64,
    /// Current rank.
    pub rank: BanRank,
    /// Offence history, oldest first.
    pub records: Vec<BanRecord>,
}

impl BanEntry {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            score: 0,
            rank: BanRank::Normal,
            records: Vec::new(),
        }
    }

    fn record(&mut self, place: &str, reason: &str) {
        self.records.push(BanRecord {
            at: Utc::now(),
            place: place.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Offence history as one line per record, for operator notices.
    #[must_use]
    pub fn reasons_text(&self) -> String {
        self.records
            .iter()
            .map(|r| format!("{} at {}: {}", r.at.format("%Y-%m-%d %H:%M:%S"), r.place, r.reason))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Concurrent ban list.
#[derive(Debug)]
pub struct BanList {
    entries: DashMap<String, BanEntry>,
    threshold_warn: i64,
    threshold_ban: i64,
    reduce_per_minute: i64,
}

impl BanList {
    /// Create an empty list with thresholds from the `[ban]` section.
    #[must_use]
    pub fn new(section: &BanSection) -> Self {
        Self {
            entries: DashMap::new(),
            threshold_warn: section.threshold_warn,
            threshold_ban: section.threshold_ban,
            reduce_per_minute: section.reduce_per_minute,
        }
    }

    /// Score that bans outright.
    #[must_use]
    pub fn threshold_ban(&self) -> i64 {
        self.threshold_ban
    }

    /// Add a penalty and re-rank. Returns the resulting rank.
    pub fn add_score(&self, id: &str, name: &str, score: i64, place: &str, reason: &str) -> BanRank {
        let mut entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| BanEntry::new(id, name));
        entry.score = entry.score.saturating_add(score);
        if !name.is_empty() {
            entry.name = name.to_string();
        }
        entry.record(place, reason);

        let before = entry.rank;
        if matches!(entry.rank, BanRank::Normal | BanRank::Warn) {
            entry.rank = if entry.score >= self.threshold_ban {
                BanRank::Banned
            } else if entry.score >= self.threshold_warn {
                BanRank::Warn
            } else {
                BanRank::Normal
            };
        }
        if entry.rank != before {
            info!(id = %id, score = entry.score, from = %before, to = %entry.rank, reason = %reason, "Ban rank changed");
        }
        entry.rank
    }

    /// Ban outright.
    pub fn ban(&self, id: &str, name: &str, place: &str, reason: &str) {
        let mut entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| BanEntry::new(id, name));
        entry.rank = BanRank::Banned;
        entry.score = entry.score.max(self.threshold_ban);
        entry.record(place, reason);
        info!(id = %id, reason = %reason, "Banned");
    }

    /// Mark as trusted.
    pub fn trust(&self, id: &str, name: &str) {
        let mut entry = self
            .entries
            .entry(id.to_string())
            .or_insert_with(|| BanEntry::new(id, name));
        entry.rank = BanRank::Trusted;
        info!(id = %id, "Trusted");
    }

    /// Drop an entry.
    pub fn remove(&self, id: &str) -> Option<BanEntry> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    /// Copy of an entry.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<BanEntry> {
        self.entries.get(id).map(|e| e.clone())
    }

    /// Rank of an entry, if listed.
    #[must_use]
    pub fn rank_of(&self, id: &str) -> Option<BanRank> {
        self.entries.get(id).map(|e| e.rank)
    }

    /// All entries, sorted by id.
    #[must_use]
    pub fn entries(&self) -> Vec<BanEntry> {
        let mut all: Vec<BanEntry> = self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One decay tick: lower normal/warn scores and forget entries that
    /// reach zero. Returns the number of entries removed.
    pub fn decay_once(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            if !matches!(entry.rank, BanRank::Normal | BanRank::Warn) {
                return true;
            }
            entry.score = entry.score.saturating_sub(self.reduce_per_minute);
            entry.score > 0
        });
        before.saturating_sub(self.entries.len())
    }
}

// ---------------------------------------------------------------------------
// Ban-list gate
// ---------------------------------------------------------------------------

/// Decision of the ban-list gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BanVerdict {
    /// Whether the message may be processed further.
    pub proceed: bool,
    /// Side effects to carry out.
    pub actions: Vec<GateAction>,
}

impl BanVerdict {
    fn pass() -> Self {
        Self {
            proceed: true,
            actions: Vec::new(),
        }
    }

    fn stop() -> Self {
        Self::default()
    }
}

/// Evaluate the ban-list gate for one message.
///
/// `role_level` is the sender's role-derived level in the conversation
/// (inviter 40, admin 50, owner 60) and decides whether a banned sender is a
/// privileged actor.
#[must_use]
pub fn evaluate_ban(
    section: &BanSection,
    ban_list: &BanList,
    message: &InboundMessage,
    privilege: Privilege,
    role_level: i32,
    leave_delay: Duration,
) -> BanVerdict {
    let group = !message.is_private();
    let conversation = message.conversation_id.as_str();
    let conversation_rank = if group { ban_list.rank_of(conversation) } else { None };
    let trusted_conversation = conversation_rank == Some(BanRank::Trusted);
    let sender = &message.sender;
    let who = format!("<{}>({})", sender.nickname, sender.id);

    let quit_actions = |notice: String, farewell: String| {
        vec![
            GateAction::SendToConversation { text: farewell },
            GateAction::notify(notice),
            GateAction::LeaveConversation { delay: leave_delay },
        ]
    };
    let sender_reasons = || {
        ban_list
            .get(sender.id.as_str())
            .map(|e| e.reasons_text())
            .unwrap_or_default()
    };

    if privilege == Privilege::Banned {
        if group && (section.quit_if_admin || section.quit_if_admin_silent_if_not_admin) {
            let mut verdict = BanVerdict::stop();
            if trusted_conversation {
                info!(conversation_id = %conversation, sender = %who, "Banned sender in trusted conversation, staying");
                return verdict;
            }
            if role_level >= PRIVILEGED_ROLE_LEVEL {
                verdict.actions.push(GateAction::SendToConversation {
                    text: format!("Warning: {who} is on the ban list. Operators will be notified and the bot will leave."),
                });
                verdict.actions.extend(quit_actions(
                    format!(
                        "Banned privileged user {who} in conversation {conversation}, leaving\n{}",
                        sender_reasons()
                    ),
                    format!("Leaving because {who} is on the ban list."),
                ));
            } else if section.quit_if_admin {
                verdict.actions.push(GateAction::SendToConversation {
                    text: format!("Warning: {who} is on the ban list. Operators will be notified."),
                });
                verdict.actions.push(GateAction::notify(format!(
                    "Banned user {who} in conversation {conversation}\n{}",
                    sender_reasons()
                )));
            } else {
                info!(conversation_id = %conversation, sender = %who, "Ignoring banned ordinary member");
            }
            return verdict;
        }
        if group && section.quit_place_immediately {
            if trusted_conversation {
                info!(conversation_id = %conversation, sender = %who, "Banned sender in trusted conversation, staying");
                return BanVerdict::stop();
            }
            return BanVerdict {
                proceed: false,
                actions: quit_actions(
                    format!(
                        "Banned user {who} in conversation {conversation}, leaving\n{}",
                        sender_reasons()
                    ),
                    format!("Leaving because {who} is on the ban list."),
                ),
            };
        }
        if section.refuse_reply {
            info!(conversation_id = %conversation, sender = %who, "Ignoring message from banned sender");
            return BanVerdict::stop();
        }
        return BanVerdict::pass();
    }

    if conversation_rank == Some(BanRank::Banned) {
        if section.quit_place_immediately {
            let reasons = ban_list
                .get(conversation)
                .map(|e| e.reasons_text())
                .unwrap_or_default();
            return BanVerdict {
                proceed: false,
                actions: quit_actions(
                    format!("Conversation {conversation} is on the ban list, leaving\n{reasons}"),
                    "Leaving because this conversation is on the ban list.".to_string(),
                ),
            };
        }
        if section.refuse_reply {
            info!(conversation_id = %conversation, "Ignoring message in banned conversation");
            return BanVerdict::stop();
        }
    }

    BanVerdict::pass()
}
