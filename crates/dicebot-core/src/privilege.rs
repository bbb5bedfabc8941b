//! Privilege ladder.
//!
//! Every message gets exactly one [`Privilege`]. Role-derived levels compete
//! (highest wins), a ban-list rank then overrides them, and master accounts
//! override everything.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::SenderRole;

/// Rank of a ban-list entry (users and conversations share the list).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BanRank {
    /// Refused service.
    Banned,
    /// Accumulating penalty score, still served.
    Warn,
    /// No standing.
    #[default]
    Normal,
    /// Exempt from penalties; suppresses auto-leave for conversations.
    Trusted,
}

impl BanRank {
    /// Numeric rank as stored by operators.
    #[must_use]
    pub fn value(self) -> i32 {
        match self {
            Self::Banned => -30,
            Self::Warn => -10,
            Self::Normal => 0,
            Self::Trusted => 30,
        }
    }
}

impl fmt::Display for BanRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banned => write!(f, "banned"),
            Self::Warn => write!(f, "warn"),
            Self::Normal => write!(f, "normal"),
            Self::Trusted => write!(f, "trusted"),
        }
    }
}

/// Effective privilege of a sender for one message.
///
/// Variants are declared in ascending [`level`](Self::level) order so the
/// derived `Ord` matches the numeric ladder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// On the ban list.
    Banned,
    /// No special standing.
    #[default]
    Default,
    /// Invited the bot into the conversation.
    Inviter,
    /// Conversation admin, or anyone in a private chat.
    Admin,
    /// Conversation owner.
    Owner,
    /// Marked trusted on the ban list.
    Trusted,
    /// Bot operator.
    Master,
}

impl Privilege {
    /// Numeric level.
    #[must_use]
    pub fn level(self) -> i32 {
        match self {
            Self::Banned => -30,
            Self::Default => 0,
            Self::Inviter => 40,
            Self::Admin => 50,
            Self::Owner => 60,
            Self::Trusted => 70,
            Self::Master => 100,
        }
    }

    /// Role-derived level before ban-list and master overrides.
    #[must_use]
    pub fn from_role(inputs: &PrivilegeInputs) -> Self {
        let mut level = Self::Default;
        if inputs.is_inviter {
            level = level.max(Self::Inviter);
        }
        if inputs.is_private || inputs.role == SenderRole::Admin {
            level = level.max(Self::Admin);
        }
        if inputs.role == SenderRole::Owner {
            level = level.max(Self::Owner);
        }
        level
    }

    /// Compute the effective privilege.
    #[must_use]
    pub fn compute(inputs: &PrivilegeInputs) -> Self {
        if inputs.is_master {
            return Self::Master;
        }
        match inputs.ban_rank {
            Some(BanRank::Banned) => Self::Banned,
            Some(BanRank::Trusted) => Self::Trusted,
            _ => Self::from_role(inputs),
        }
    }

    /// Whether this privilege is at least `other`.
    #[must_use]
    pub fn at_least(self, other: Self) -> bool {
        self >= other
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.level())
    }
}

/// Everything the privilege computation looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivilegeInputs {
    /// Platform-reported role.
    pub role: SenderRole,
    /// Private chat message.
    pub is_private: bool,
    /// Sender invited the bot into this conversation.
    pub is_inviter: bool,
    /// Sender's ban-list rank, if listed.
    pub ban_rank: Option<BanRank>,
    /// Sender is a configured master.
    pub is_master: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_ordering_matches_levels() {
        let ladder = [
            Privilege::Banned,
            Privilege::Default,
            Privilege::Inviter,
            Privilege::Admin,
            Privilege::Owner,
            Privilege::Trusted,
            Privilege::Master,
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].level() < pair[1].level());
        }
    }

    #[test]
    fn test_role_levels() {
        let owner = PrivilegeInputs {
            role: SenderRole::Owner,
            is_inviter: true,
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&owner), Privilege::Owner);

        let private = PrivilegeInputs {
            is_private: true,
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&private), Privilege::Admin);

        let inviter = PrivilegeInputs {
            is_inviter: true,
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&inviter), Privilege::Inviter);
        assert_eq!(Privilege::compute(&PrivilegeInputs::default()), Privilege::Default);
    }

    #[test]
    fn test_banned_overrides_owner_but_not_master() {
        let banned_owner = PrivilegeInputs {
            role: SenderRole::Owner,
            ban_rank: Some(BanRank::Banned),
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&banned_owner), Privilege::Banned);
        assert_eq!(Privilege::from_role(&banned_owner), Privilege::Owner);

        let banned_master = PrivilegeInputs {
            is_master: true,
            ..banned_owner
        };
        assert_eq!(Privilege::compute(&banned_master), Privilege::Master);
    }

    #[test]
    fn test_trusted_rank() {
        let trusted = PrivilegeInputs {
            role: SenderRole::Admin,
            ban_rank: Some(BanRank::Trusted),
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&trusted).level(), 70);

        let warned = PrivilegeInputs {
            ban_rank: Some(BanRank::Warn),
            ..Default::default()
        };
        assert_eq!(Privilege::compute(&warned), Privilege::Default);
    }
}
