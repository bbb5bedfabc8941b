//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_dispatch::prelude::*;` to import all essential types.

pub use crate::{DispatchError, DispatchResult};

pub use crate::{
    CommandParser, Conversation, ConversationStore, DispatchOutcome, Dispatcher, EndpointStats,
    run_inbound_router,
};
