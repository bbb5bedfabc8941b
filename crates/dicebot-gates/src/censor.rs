//! Content filter.
//!
//! Each severity level owns a word list compiled into one case-insensitive
//! regex. A message is classified by the highest level it hits; per-user hit
//! counters per level decide when the level's actions fire.

use std::fmt;

use dashmap::DashMap;
use dicebot_config::{CensorAction, CensorLevelSection, CensorMode, CensorSection};
use dicebot_core::{InboundMessage, Reply, UserId};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::action::GateAction;
use crate::ban::BanList;
use crate::error::{GateError, GateResult};

/// Severity levels, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CensorLevel {
    /// Mild.
    Notice,
    /// Questionable.
    Caution,
    /// Offensive.
    Warning,
    /// Never acceptable.
    Danger,
}

impl CensorLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 4] = [Self::Notice, Self::Caution, Self::Warning, Self::Danger];

    fn index(self) -> usize {
        match self {
            Self::Notice => 0,
            Self::Caution => 1,
            Self::Warning => 2,
            Self::Danger => 3,
        }
    }
}

impl fmt::Display for CensorLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notice => write!(f, "notice"),
            Self::Caution => write!(f, "caution"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

#[derive(Debug)]
struct CompiledLevel {
    level: CensorLevel,
    // None when the level has no words.
    pattern: Option<Regex>,
    threshold: u32,
    actions: Vec<CensorAction>,
    score: i64,
}

impl CompiledLevel {
    fn compile(level: CensorLevel, section: &CensorLevelSection, case_sensitive: bool) -> GateResult<Self> {
        let words: Vec<String> = section
            .words
            .iter()
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(w))
            .collect();
        let pattern = if words.is_empty() {
            None
        } else {
            let regex = RegexBuilder::new(&words.join("|"))
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|source| GateError::InvalidPattern {
                    level: level.to_string(),
                    source,
                })?;
            Some(regex)
        };
        Ok(Self {
            level,
            pattern,
            threshold: section.threshold,
            actions: section.actions.clone(),
            score: section.score,
        })
    }

    fn matches(&self, text: &str) -> Vec<String> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        let mut words: Vec<String> = Vec::new();
        for m in pattern.find_iter(text) {
            let word = m.as_str().to_string();
            if !words.contains(&word) {
                words.push(word);
            }
        }
        words
    }
}

/// Outcome of filtering one inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CensorVerdict {
    /// Highest level hit, if any.
    pub level: Option<CensorLevel>,
    /// Distinct words matched at that level.
    pub words: Vec<String>,
    /// A level's threshold was passed and its actions fired; the message
    /// ends without a refusal reply.
    pub terminate: bool,
    /// Side effects of the fired level.
    pub actions: Vec<GateAction>,
}

impl CensorVerdict {
    /// Whether anything was hit.
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.level.is_some()
    }
}

/// Per-level word filter with per-user hit counters.
#[derive(Debug)]
pub struct ContentFilter {
    enabled: bool,
    mode: CensorMode,
    levels: Vec<CompiledLevel>,
    hits: DashMap<UserId, [u32; 4]>,
    message_notice: String,
    command_notice: String,
    reply_notice: String,
}

impl ContentFilter {
    /// Compile the `[censor]` section.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidPattern`] if a word list does not compile.
    pub fn from_section(section: &CensorSection) -> GateResult<Self> {
        let sections = [
            &section.levels.notice,
            &section.levels.caution,
            &section.levels.warning,
            &section.levels.danger,
        ];
        let levels = CensorLevel::ALL
            .iter()
            .zip(sections)
            .map(|(level, s)| CompiledLevel::compile(*level, s, section.case_sensitive))
            .collect::<GateResult<Vec<_>>>()?;
        let words = levels.iter().filter(|l| l.pattern.is_some()).count();
        info!(enabled = section.enabled, mode = ?section.mode, levels_with_words = words, "Content filter ready");
        Ok(Self {
            enabled: section.enabled,
            mode: section.mode,
            levels,
            hits: DashMap::new(),
            message_notice: section.intercept_message_notice.clone(),
            command_notice: section.intercept_command_notice.clone(),
            reply_notice: section.intercept_reply_notice.clone(),
        })
    }

    /// A filter that never hits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            mode: CensorMode::default(),
            levels: Vec::new(),
            hits: DashMap::new(),
            message_notice: String::new(),
            command_notice: String::new(),
            reply_notice: String::new(),
        }
    }

    /// Whether inbound traffic should be inspected.
    ///
    /// Full intercept covers every message in a bot-on conversation;
    /// command-only intercept covers command attempts in private chats or
    /// bot-on conversations.
    #[must_use]
    pub fn inspects_input(&self, is_command: bool, is_private: bool, bot_on: bool) -> bool {
        if !self.enabled {
            return false;
        }
        match self.mode {
            CensorMode::AllInput => bot_on || is_private,
            CensorMode::OnlyInputCommand => is_command && (is_private || bot_on),
            CensorMode::OnlyOutputReply => false,
        }
    }

    /// Highest level hit by `text` and its distinct matched words.
    #[must_use]
    pub fn classify(&self, text: &str) -> Option<(CensorLevel, Vec<String>)> {
        self.levels.iter().rev().find_map(|level| {
            let words = level.matches(text);
            (!words.is_empty()).then_some((level.level, words))
        })
    }

    /// Current hit count for `user` at `level`.
    #[must_use]
    pub fn hit_count(&self, user: &UserId, level: CensorLevel) -> u32 {
        self.hits
            .get(user)
            .and_then(|counts| counts.get(level.index()).copied())
            .unwrap_or(0)
    }

    /// Filter one inbound message, recording the hit and firing level
    /// actions when a threshold is passed.
    pub fn check(
        &self,
        message: &InboundMessage,
        inviter: Option<&UserId>,
        ban_list: &BanList,
    ) -> CensorVerdict {
        let Some((level, words)) = self.classify(&message.text) else {
            return CensorVerdict::default();
        };
        let sender = &message.sender;
        debug!(
            conversation_id = %message.conversation_id,
            sender_id = %sender.id,
            %level,
            words = ?words,
            "Content filter hit"
        );

        let fired = {
            let mut counts = self.hits.entry(sender.id.clone()).or_insert([0; 4]);
            if let Some(count) = counts.get_mut(level.index()) {
                *count = count.saturating_add(1);
            }
            // Walk from the top; the first level over its threshold fires.
            let mut fired = None;
            for compiled in self.levels.iter().rev() {
                let Some(count) = counts.get_mut(compiled.level.index()) else {
                    continue;
                };
                if *count > compiled.threshold {
                    *count = 0;
                    fired = Some(compiled);
                    break;
                }
            }
            fired
        };

        let mut verdict = CensorVerdict {
            level: Some(level),
            words,
            terminate: false,
            actions: Vec::new(),
        };
        if let Some(compiled) = fired {
            verdict.terminate = true;
            verdict.actions = self.fire(compiled, message, inviter, ban_list, &verdict.words);
        }
        verdict
    }

    fn fire(
        &self,
        level: &CompiledLevel,
        message: &InboundMessage,
        inviter: Option<&UserId>,
        ban_list: &BanList,
        words: &[String],
    ) -> Vec<GateAction> {
        let sender = &message.sender;
        let conversation = message.conversation_id.as_str();
        let reason = format!("content filter ({})", level.level);
        let threshold_ban = ban_list.threshold_ban();
        let mut actions = Vec::new();

        info!(
            conversation_id = %conversation,
            sender_id = %sender.id,
            level = %level.level,
            actions = ?level.actions,
            "Content filter threshold passed"
        );

        for action in &level.actions {
            match action {
                CensorAction::SendWarning => actions.push(GateAction::reply(format!(
                    "Your message contained {} level blocked words. Repeated violations are penalized.",
                    level.level
                ))),
                CensorAction::SendNotice => actions.push(GateAction::notify(format!(
                    "Content filter: <{}>({}) in {conversation} hit {} level words: {}",
                    sender.nickname,
                    sender.id,
                    level.level,
                    words.join(", ")
                ))),
                CensorAction::BanUser => {
                    ban_list.add_score(sender.id.as_str(), &sender.nickname, threshold_ban, conversation, &reason);
                },
                CensorAction::BanConversation => {
                    if !message.is_private() {
                        ban_list.add_score(conversation, "", threshold_ban, conversation, &reason);
                    }
                },
                CensorAction::BanInviter => {
                    if let Some(inviter) = inviter {
                        ban_list.add_score(inviter.as_str(), "", threshold_ban, conversation, &reason);
                    }
                },
                CensorAction::AddScore => {
                    ban_list.add_score(sender.id.as_str(), &sender.nickname, level.score, conversation, &reason);
                },
            }
        }
        actions
    }

    /// Refusal sent for a hit that did not terminate (empty: stay silent).
    #[must_use]
    pub fn refusal(&self, is_command: bool, level: CensorLevel) -> Option<String> {
        let template = if is_command {
            &self.command_notice
        } else {
            &self.message_notice
        };
        (!template.is_empty()).then(|| template.replace("{level}", &level.to_string()))
    }

    /// Withhold outbound replies containing blocked words, when the filter
    /// runs in reply mode. Operator notices pass untouched.
    #[must_use]
    pub fn censor_outbound(&self, replies: Vec<Reply>) -> Vec<Reply> {
        if !self.enabled || self.mode != CensorMode::OnlyOutputReply {
            return replies;
        }
        replies
            .into_iter()
            .map(|reply| match reply {
                Reply::ToSender(ref text) if self.classify(text).is_some() => {
                    Reply::ToSender(self.reply_notice.clone())
                },
                Reply::ToConversation(ref text) if self.classify(text).is_some() => {
                    Reply::ToConversation(self.reply_notice.clone())
                },
                other => other,
            })
            .collect()
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::disabled()
    }
}
