//! Test fixtures for messages and capabilities.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dicebot_core::{ConversationId, InboundMessage, Platform, Reply, Sender, UserId};
use dicebot_extensions::{Capability, CapabilityBuilder, CommandOutcome};

/// Platform tag used by the fixtures.
pub const PLATFORM: &str = "QQ";
/// Group conversation used by [`group_message`].
pub const GROUP_ID: &str = "QQ-Group:1000";
/// The bot's own account.
pub const BOT_ID: &str = "QQ:10000";

/// A group message from `sender` in [`GROUP_ID`].
#[must_use]
pub fn group_message(sender: &str, text: &str) -> InboundMessage {
    InboundMessage::builder(
        ConversationId::new(GROUP_ID),
        Platform::new(PLATFORM),
        Sender::new(UserId::new(sender), sender),
        text,
    )
    .build()
}

/// A private message from `sender`; the conversation id is the sender's id.
#[must_use]
pub fn private_message(sender: &str, text: &str) -> InboundMessage {
    InboundMessage::builder(
        ConversationId::new(sender),
        Platform::new(PLATFORM),
        Sender::new(UserId::new(sender), sender),
        text,
    )
    .private()
    .build()
}

/// A capability with one command that replies `"<name>:<command> <clean args>"`.
#[must_use]
pub fn echo_capability(name: &str, command: &str) -> CapabilityBuilder {
    let tag = format!("{name}:{command}");
    Capability::builder(name).command(command, move |ctx| {
        CommandOutcome::reply(format!("{tag} {}", ctx.command.clean_args).trim_end().to_string())
    })
}

/// A capability whose not-a-command hook counts calls.
#[must_use]
pub fn counting_capability(name: &str) -> (CapabilityBuilder, Arc<AtomicUsize>) {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&counter);
    let builder = Capability::builder(name).on_not_command(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Vec::<Reply>::new()
    });
    (builder, counter)
}
