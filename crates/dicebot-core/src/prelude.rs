//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_core::prelude::*;` to import all essential types.
//!
//! # Example
//!
//! ```rust
//! use dicebot_core::prelude::*;
//!
//! let msg = InboundMessage::builder(
//!     ConversationId::new("QQ-Group:42"),
//!     Platform::new("QQ"),
//!     Sender::new(UserId::new("QQ:7"), "alice"),
//!     ".r d20",
//! )
//! .build();
//! assert_eq!(msg.kind, MessageKind::Group);
//! ```

// Identifiers
pub use crate::{ConversationId, Platform, UserId};

// Messages
pub use crate::{InboundMessage, InboundMessageBuilder, MessageKind, Sender, SenderRole};

// Privilege
pub use crate::{BanRank, Privilege, PrivilegeInputs};

// Commands
pub use crate::{Kwarg, ParsedCommand};

// Outbound
pub use crate::{Reply, ReplyError, ReplyResult, ReplySurface, deliver};
