//! Prelude module - commonly used test helpers.
//!
//! Use `use dicebot_test::prelude::*;` in test modules.

pub use crate::{Delivered, RecordingReplySurface};

pub use crate::{
    BOT_ID, GROUP_ID, PLATFORM, counting_capability, echo_capability, group_message,
    init_test_logging, private_message,
};
