//! Configuration types for the dicebot runtime.
//!
//! Every struct implements [`Default`] with the production defaults, so a
//! bare `[section]` header in TOML produces a working configuration. The
//! embedded `defaults.toml` spells the same values out for operators.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command recognition and conversation defaults.
    pub dispatch: DispatchSection,
    /// Capability activation limits.
    pub activation: ActivationSection,
    /// Command rate limiting.
    pub rate_limit: RateLimitSection,
    /// Ban-list thresholds and behaviours.
    pub ban: BanSection,
    /// Content filter.
    pub censor: CensorSection,
    /// Scripted-hook worker.
    pub scripting: ScriptingSection,
    /// Logging level, format, and per-crate directives.
    pub logging: LoggingSection,
    /// Operator overrides keyed by capability name.
    pub extensions: HashMap<String, ExtensionSection>,
}

// ---------------------------------------------------------------------------
// DispatchSection
// ---------------------------------------------------------------------------

/// Command recognition and conversation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    /// Leading symbols that mark a message as a command attempt.
    pub command_prefixes: Vec<String>,
    /// The bot's own user id (used for mention detection).
    pub bot_id: String,
    /// User ids with master privilege.
    pub masters: Vec<String>,
    /// Whether a newly seen conversation starts with the bot on.
    pub auto_on: bool,
    /// Per-platform override of `auto_on`.
    pub platform_auto_on: HashMap<String, bool>,
    /// Whether custom keyword replies are enabled (forces context loading).
    pub custom_reply_enabled: bool,
    /// Notify operators when a conversation is auto-created.
    pub notify_on_new_conversation: bool,
    /// Delay between the farewell notice and leaving a conversation.
    pub leave_delay_ms: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            command_prefixes: vec![".".to_owned(), "。".to_owned(), "/".to_owned()],
            bot_id: "console:bot".to_owned(),
            masters: Vec::new(),
            auto_on: true,
            platform_auto_on: HashMap::from([("QQ-CH".to_owned(), false)]),
            custom_reply_enabled: false,
            notify_on_new_conversation: true,
            leave_delay_ms: 1_000,
        }
    }
}

impl DispatchSection {
    /// Bot-on policy for a new conversation on `platform`.
    #[must_use]
    pub fn auto_on_for(&self, platform: &str) -> bool {
        self.platform_auto_on
            .get(platform)
            .copied()
            .unwrap_or(self.auto_on)
    }
}

// ---------------------------------------------------------------------------
// ActivationSection
// ---------------------------------------------------------------------------

/// Capability activation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSection {
    /// Maximum depth followed when expanding companion chains.
    pub max_chain_depth: usize,
}

impl Default for ActivationSection {
    fn default() -> Self {
        Self { max_chain_depth: 10 }
    }
}

// ---------------------------------------------------------------------------
// RateLimitSection
// ---------------------------------------------------------------------------

/// Command rate limiting (token buckets per sender and per conversation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSection {
    /// Whether the gate is consulted at all.
    pub enabled: bool,
    /// Seconds per token for a single sender.
    pub personal_refill_secs: u64,
    /// Bucket capacity for a single sender.
    pub personal_burst: u32,
    /// Seconds per token for a whole conversation.
    pub conversation_refill_secs: u64,
    /// Bucket capacity for a whole conversation.
    pub conversation_burst: u32,
    /// Ban-list score added when a warned sender keeps going.
    pub spam_penalty_score: i64,
}

impl Default for RateLimitSection {
    fn default() -> Self {
        Self {
            enabled: false,
            personal_refill_secs: 3,
            personal_burst: 3,
            conversation_refill_secs: 3,
            conversation_burst: 3,
            spam_penalty_score: 100,
        }
    }
}

// ---------------------------------------------------------------------------
// BanSection
// ---------------------------------------------------------------------------

/// Ban-list thresholds and the behaviours applied to banned parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct BanSection {
    /// Silently drop messages from banned senders.
    pub refuse_reply: bool,
    /// Leave a group when a banned sender speaks there.
    pub quit_place_immediately: bool,
    /// Leave when a banned privileged actor speaks; warn ordinary members.
    pub quit_if_admin: bool,
    /// As `quit_if_admin`, but stay silent towards ordinary members.
    pub quit_if_admin_silent_if_not_admin: bool,
    /// Score at which an entry becomes `warn`.
    pub threshold_warn: i64,
    /// Score at which an entry becomes `banned`.
    pub threshold_ban: i64,
    /// Score removed from warn/normal entries every minute.
    pub reduce_per_minute: i64,
}

impl Default for BanSection {
    fn default() -> Self {
        Self {
            refuse_reply: true,
            quit_place_immediately: false,
            quit_if_admin: false,
            quit_if_admin_silent_if_not_admin: false,
            threshold_warn: 100,
            threshold_ban: 200,
            reduce_per_minute: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// CensorSection
// ---------------------------------------------------------------------------

/// Which traffic the content filter inspects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CensorMode {
    /// Only outbound replies.
    OnlyOutputReply,
    /// Only recognized command attempts.
    OnlyInputCommand,
    /// Every inbound message in a bot-on conversation.
    #[default]
    AllInput,
}

/// What happens when a level's hit count passes its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CensorAction {
    /// Reply with the level's warning notice.
    SendWarning,
    /// Notify operators.
    SendNotice,
    /// Push the sender straight to the ban threshold.
    BanUser,
    /// Push the conversation straight to the ban threshold.
    BanConversation,
    /// Push the conversation's inviter straight to the ban threshold.
    BanInviter,
    /// Add the level's score to the sender.
    AddScore,
}

/// Word list and response for one severity level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CensorLevelSection {
    /// Literal words (matched as substrings).
    pub words: Vec<String>,
    /// Hits tolerated before the actions fire.
    pub threshold: u32,
    /// Actions fired when the threshold is passed.
    pub actions: Vec<CensorAction>,
    /// Score used by [`CensorAction::AddScore`].
    pub score: i64,
}

impl Default for CensorLevelSection {
    fn default() -> Self {
        Self {
            words: Vec::new(),
            threshold: 0,
            actions: vec![CensorAction::SendWarning],
            score: 100,
        }
    }
}

/// The four severity levels, lowest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CensorLevels {
    /// Lowest severity.
    pub notice: CensorLevelSection,
    /// Second severity.
    pub caution: CensorLevelSection,
    /// Third severity.
    pub warning: CensorLevelSection,
    /// Highest severity.
    pub danger: CensorLevelSection,
}

impl Default for CensorLevels {
    fn default() -> Self {
        Self {
            notice: CensorLevelSection {
                threshold: 5,
                ..Default::default()
            },
            caution: CensorLevelSection {
                threshold: 2,
                ..Default::default()
            },
            warning: CensorLevelSection {
                threshold: 1,
                actions: vec![CensorAction::SendWarning, CensorAction::SendNotice],
                ..Default::default()
            },
            danger: CensorLevelSection {
                threshold: 0,
                actions: vec![
                    CensorAction::SendWarning,
                    CensorAction::SendNotice,
                    CensorAction::BanUser,
                ],
                ..Default::default()
            },
        }
    }
}

/// Content filter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CensorSection {
    /// Whether the filter runs.
    pub enabled: bool,
    /// Which traffic is inspected.
    pub mode: CensorMode,
    /// Match words case-sensitively.
    pub case_sensitive: bool,
    /// Refusal sent for an intercepted message (empty: stay silent).
    pub intercept_message_notice: String,
    /// Refusal sent for an intercepted command (empty: stay silent).
    pub intercept_command_notice: String,
    /// Text that replaces a withheld outbound reply.
    pub intercept_reply_notice: String,
    /// Per-level word lists and responses.
    pub levels: CensorLevels,
}

impl Default for CensorSection {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: CensorMode::default(),
            case_sensitive: false,
            intercept_message_notice: "This message was not processed: it contains blocked words."
                .to_owned(),
            intercept_command_notice: "This command was not processed: it contains blocked words."
                .to_owned(),
            intercept_reply_notice: "A reply was withheld: it contains blocked words.".to_owned(),
            levels: CensorLevels::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptingSection
// ---------------------------------------------------------------------------

/// Scripted-hook worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptingSection {
    /// Whether scripted hooks run at all.
    pub enabled: bool,
    /// Upper bound on a single scripted hook invocation.
    pub timeout_secs: u64,
    /// Pending jobs the worker queue holds before callers wait.
    pub queue_capacity: usize,
}

impl Default for ScriptingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
            queue_capacity: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"`, or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["dicebot_dispatch=debug"]`).
    pub directives: Vec<String>,
    /// Write rolling daily log files into this directory instead of stderr.
    pub directory: Option<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
            directory: None,
        }
    }
}

// ---------------------------------------------------------------------------
// ExtensionSection
// ---------------------------------------------------------------------------

/// Operator overrides for one capability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtensionSection {
    /// Replaces the capability's default-auto-activate policy.
    pub auto_activate: Option<bool>,
    /// Commands of this capability the operator has switched off.
    pub disabled_commands: Vec<String>,
}
