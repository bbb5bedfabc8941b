//! Dicebot Core - Foundation types and traits for the dicebot dispatch core.
//!
//! This crate provides:
//! - Identifier newtypes for conversations, users and platforms
//! - The normalized [`InboundMessage`] produced by platform adapters
//! - The privilege ladder used by the admission gates
//! - The [`ParsedCommand`] shape handed to command handlers
//! - The [`ReplySurface`] trait through which the core talks back
//!
//! Nothing in here knows about wire formats. Adapters translate platform
//! payloads into these types before the dispatch pipeline sees them.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod command;
pub mod error;
pub mod ids;
pub mod message;
pub mod privilege;
pub mod reply;

pub use command::{Kwarg, ParsedCommand};
pub use error::{ReplyError, ReplyResult};
pub use ids::{ConversationId, Platform, UserId};
pub use message::{InboundMessage, InboundMessageBuilder, MessageKind, Sender, SenderRole};
pub use privilege::{BanRank, Privilege, PrivilegeInputs};
pub use reply::{Reply, ReplySurface, deliver};
