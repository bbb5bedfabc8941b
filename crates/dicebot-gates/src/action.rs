//! Side effects requested by a gate.

use std::time::Duration;

use dicebot_core::Reply;
use serde::{Deserialize, Serialize};

/// Something the pipeline must do on a gate's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateAction {
    /// Reply to the sender.
    ReplyToSender {
        /// Reply text.
        text: String,
    },
    /// Post into the message's conversation.
    SendToConversation {
        /// Message text.
        text: String,
    },
    /// Tell the bot operators.
    NotifyOperators {
        /// Notice text.
        text: String,
    },
    /// Leave the message's conversation after a pause.
    LeaveConversation {
        /// Pause before leaving, so the farewell lands first.
        #[serde(with = "millis")]
        delay: Duration,
    },
}

impl GateAction {
    /// Shorthand for [`GateAction::ReplyToSender`].
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::ReplyToSender { text: text.into() }
    }

    /// Shorthand for [`GateAction::NotifyOperators`].
    #[must_use]
    pub fn notify(text: impl Into<String>) -> Self {
        Self::NotifyOperators { text: text.into() }
    }

    /// The equivalent [`Reply`], for actions that are plain messages.
    #[must_use]
    pub fn as_reply(&self) -> Option<Reply> {
        match self {
            Self::ReplyToSender { text } => Some(Reply::ToSender(text.clone())),
            Self::SendToConversation { text } => Some(Reply::ToConversation(text.clone())),
            Self::NotifyOperators { text } => Some(Reply::NotifyOperators(text.clone())),
            Self::LeaveConversation { .. } => None,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
