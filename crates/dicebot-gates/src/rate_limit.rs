//! Command rate limiting.
//!
//! Two token buckets guard every resolved command: one per sender and one
//! per group conversation. An empty bucket first warns and arms a flag; a
//! further denial while armed adds a penalty to the ban list. Any pass
//! disarms the flag again.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use dicebot_config::RateLimitSection;
use dicebot_core::{InboundMessage, Privilege, UserId};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::action::GateAction;
use crate::ban::BanList;

/// Capacity used when the configured burst is zero.
const DEFAULT_BURST: u32 = 3;
/// Refill interval used when the configured interval is zero.
const DEFAULT_REFILL: Duration = Duration::from_secs(3);

// ---------------------------------------------------------------------------
// Token bucket
// ---------------------------------------------------------------------------

/// Bucket shape: one token per `refill`, at most `burst` banked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketShape {
    /// Time to earn one token.
    pub refill: Duration,
    /// Maximum tokens banked.
    pub burst: u32,
}

impl BucketShape {
    /// Build a shape, substituting defaults for zero values.
    #[must_use]
    pub fn new(refill_secs: u64, burst: u32) -> Self {
        Self {
            refill: if refill_secs == 0 {
                DEFAULT_REFILL
            } else {
                Duration::from_secs(refill_secs)
            },
            burst: if burst == 0 { DEFAULT_BURST } else { burst },
        }
    }
}

/// A classic token bucket that refills in whole tokens.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    shape: BucketShape,
    tokens: u32,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket.
    #[must_use]
    pub fn new(shape: BucketShape, now: Instant) -> Self {
        Self {
            shape,
            tokens: shape.burst,
            last_refill: now,
        }
    }

    /// Tokens currently banked (without refilling).
    #[must_use]
    pub fn tokens(&self) -> u32 {
        self.tokens
    }

    /// Take one token if available.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens == 0 {
            return false;
        }
        self.tokens = self.tokens.saturating_sub(1);
        true
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed
            .as_nanos()
            .checked_div(self.shape.refill.as_nanos())
            .unwrap_or(0);
        if earned == 0 {
            return;
        }
        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(earned).min(self.shape.burst);
        if self.tokens == self.shape.burst {
            self.last_refill = now;
        } else {
            // Keep the partial progress toward the next token.
            let consumed = self.shape.refill.checked_mul(earned).unwrap_or(elapsed);
            self.last_refill = self.last_refill.checked_add(consumed).unwrap_or(now);
        }
    }
}

// ---------------------------------------------------------------------------
// Per-conversation state
// ---------------------------------------------------------------------------

/// Which bucket denied a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    /// The sender's own bucket.
    Personal,
    /// The conversation's shared bucket.
    Conversation,
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Personal => write!(f, "personal"),
            Self::Conversation => write!(f, "conversation"),
        }
    }
}

/// Buckets and warned flags for one conversation.
///
/// Lives inside the conversation record, so it is only touched while the
/// conversation lock is held.
#[derive(Debug, Default)]
pub struct RateLimitState {
    conversation: Option<TokenBucket>,
    personal: HashMap<UserId, TokenBucket>,
    warned_senders: HashSet<UserId>,
    conversation_warned: bool,
}

impl RateLimitState {
    /// Fresh state with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `sender` is armed for a penalty.
    #[must_use]
    pub fn is_sender_warned(&self, sender: &UserId) -> bool {
        self.warned_senders.contains(sender)
    }

    /// Whether the conversation is armed for a penalty.
    #[must_use]
    pub fn is_conversation_warned(&self) -> bool {
        self.conversation_warned
    }
}

// ---------------------------------------------------------------------------
// Limiter
// ---------------------------------------------------------------------------

/// Result of consulting the rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// The command may stand.
    Allowed,
    /// First denial: warn and arm.
    Warned {
        /// Bucket that ran dry.
        scope: RateScope,
    },
    /// Denied while armed: penalty applied.
    Penalized {
        /// Bucket that ran dry.
        scope: RateScope,
        /// Score added to the ban list.
        score: i64,
    },
}

impl RateLimitOutcome {
    /// Whether the command was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        !matches!(self, Self::Allowed)
    }

    /// What the pipeline should send in place of the command's replies.
    #[must_use]
    pub fn actions(&self, message: &InboundMessage) -> Vec<GateAction> {
        match self {
            Self::Allowed => Vec::new(),
            Self::Warned { scope: RateScope::Personal } => vec![GateAction::reply(
                "You are sending commands too fast. Slow down or you will be penalized.",
            )],
            Self::Warned { scope: RateScope::Conversation } => vec![GateAction::reply(
                "This conversation is sending commands too fast. Slow down or it will be penalized.",
            )],
            Self::Penalized { scope, score } => {
                let target = match scope {
                    RateScope::Personal => format!("<{}>({})", message.sender.nickname, message.sender.id),
                    RateScope::Conversation => message.conversation_id.to_string(),
                };
                vec![
                    GateAction::reply("Command spam detected. A penalty has been recorded."),
                    GateAction::notify(format!(
                        "Command spam by {target} in {}: +{score} ban score",
                        message.conversation_id
                    )),
                ]
            },
        }
    }
}

/// Rate limiter configured from the `[rate_limit]` section.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    enabled: bool,
    personal: BucketShape,
    conversation: BucketShape,
    penalty: i64,
}

impl RateLimiter {
    /// Build from configuration.
    #[must_use]
    pub fn from_section(section: &RateLimitSection) -> Self {
        Self {
            enabled: section.enabled,
            personal: BucketShape::new(section.personal_refill_secs, section.personal_burst),
            conversation: BucketShape::new(
                section.conversation_refill_secs,
                section.conversation_burst,
            ),
            penalty: section.spam_penalty_score,
        }
    }

    /// A limiter that allows everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::from_section(&RateLimitSection {
            enabled: false,
            ..Default::default()
        })
    }

    /// Whether the limiter is consulted at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Charge one resolved command.
    pub fn check(
        &self,
        state: &mut RateLimitState,
        message: &InboundMessage,
        privilege: Privilege,
        ban_list: &BanList,
        now: Instant,
    ) -> RateLimitOutcome {
        if !self.enabled || privilege == Privilege::Master {
            return RateLimitOutcome::Allowed;
        }

        let sender = &message.sender.id;
        let place = message.conversation_id.as_str();

        let bucket = state
            .personal
            .entry(sender.clone())
            .or_insert_with(|| TokenBucket::new(self.personal, now));
        if bucket.try_acquire(now) {
            state.warned_senders.remove(sender);
        } else if state.warned_senders.contains(sender) {
            warn!(sender_id = %sender, conversation_id = %place, "Personal command spam, penalizing");
            ban_list.add_score(
                sender.as_str(),
                &message.sender.nickname,
                self.penalty,
                place,
                "command spam",
            );
            return RateLimitOutcome::Penalized {
                scope: RateScope::Personal,
                score: self.penalty,
            };
        } else {
            debug!(sender_id = %sender, conversation_id = %place, "Personal rate limit hit");
            state.warned_senders.insert(sender.clone());
            return RateLimitOutcome::Warned {
                scope: RateScope::Personal,
            };
        }

        if message.is_private() {
            return RateLimitOutcome::Allowed;
        }

        let bucket = state
            .conversation
            .get_or_insert_with(|| TokenBucket::new(self.conversation, now));
        if bucket.try_acquire(now) {
            state.conversation_warned = false;
            RateLimitOutcome::Allowed
        } else if state.conversation_warned {
            warn!(conversation_id = %place, "Conversation command spam, penalizing");
            ban_list.add_score(place, "", self.penalty, place, "conversation command spam");
            RateLimitOutcome::Penalized {
                scope: RateScope::Conversation,
                score: self.penalty,
            }
        } else {
            debug!(conversation_id = %place, "Conversation rate limit hit");
            state.conversation_warned = true;
            RateLimitOutcome::Warned {
                scope: RateScope::Conversation,
            }
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::disabled()
    }
}
