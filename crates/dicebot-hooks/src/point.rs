//! Named hook points.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where in the pipeline a capability is being called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    /// Every message in an active conversation.
    MessageReceived,
    /// A command is about to be resolved.
    CommandReceived,
    /// A message that is not a command.
    NotCommand,
    /// A command that a capability may take over.
    CommandOverride,
    /// A command handler.
    Command,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MessageReceived => "on_message_received",
            Self::CommandReceived => "on_command_received",
            Self::NotCommand => "on_not_command",
            Self::CommandOverride => "on_command_override",
            Self::Command => "command",
        };
        f.write_str(name)
    }
}
