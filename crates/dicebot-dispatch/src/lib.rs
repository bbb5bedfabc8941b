//! Dicebot Dispatch - the message pipeline of the dice-bot core.
//!
//! This crate provides:
//! - [`ConversationStore`]: per-conversation state behind its own lock
//! - [`CommandParser`]: prefix and longest-candidate command recognition
//! - [`CoreCommands`]: the built-in `ext`, `bot` and `botlist` commands
//! - [`Dispatcher`]: the staged pipeline from inbound message to replies
//! - [`run_inbound_router`]: the task that feeds adapters into the dispatcher
//!
//! # Example
//!
//! ```rust,ignore
//! use dicebot_dispatch::prelude::*;
//!
//! let dispatcher = Dispatcher::new(&config, registry, surface)?;
//! let outcome = dispatcher.dispatch(message).await;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod conversation;
pub mod core_commands;
pub mod dispatcher;
pub mod error;
pub mod parser;
pub mod router;
pub mod stats;

pub use conversation::{Conversation, ConversationStore, MemberRecord};
pub use core_commands::{CoreCommand, CoreCommands, CoreContext, CoreHandler};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, DispatchResult};
pub use parser::{CommandParser, DEFAULT_PREFIXES};
pub use router::{forward_inbound, run_inbound_router};
pub use stats::{EndpointSnapshot, EndpointStats};
