//! Commands built into the dispatcher itself.
//!
//! Unlike capability commands these need the conversation record and the
//! registry, so they get a [`CoreContext`] instead of a bare
//! [`CommandContext`].

use std::collections::BTreeSet;

use dicebot_core::{Privilege, UserId};
use dicebot_extensions::{CapabilityRegistry, CommandContext, CommandFlags, CommandOutcome};
use tracing::info;

use crate::conversation::Conversation;

/// Everything a core command may touch.
pub struct CoreContext<'a> {
    /// The conversation the command arrived in.
    pub conversation: &'a mut Conversation,
    /// The capability registry.
    pub registry: &'a CapabilityRegistry,
    /// The command and its message.
    pub command: &'a CommandContext,
    /// The bot's own account.
    pub bot_id: &'a UserId,
}

impl CoreContext<'_> {
    fn privilege(&self) -> Privilege {
        self.command.event.privilege
    }

    fn is_private(&self) -> bool {
        self.command.event.is_private()
    }

    fn addressed_elsewhere(&self) -> bool {
        self.command.event.message.mentions_someone_else(self.bot_id)
    }
}

/// Signature of a core command handler.
pub type CoreHandler = fn(&mut CoreContext<'_>) -> CommandOutcome;

/// One entry of the core command table.
#[derive(Debug, Clone, Copy)]
pub struct CoreCommand {
    /// Command word.
    pub name: &'static str,
    /// Help text shown on request.
    pub help: &'static str,
    /// Eligibility flags.
    pub flags: CommandFlags,
    /// The handler.
    pub handler: CoreHandler,
}

/// The global command table consulted before any capability.
#[derive(Debug, Clone)]
pub struct CoreCommands {
    commands: Vec<CoreCommand>,
}

impl CoreCommands {
    /// The built-in `ext`, `bot` and `botlist` commands.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            commands: vec![
                CoreCommand {
                    name: "ext",
                    help: EXT_HELP,
                    flags: CommandFlags::default(),
                    handler: ext,
                },
                CoreCommand {
                    name: "bot",
                    help: BOT_HELP,
                    flags: CommandFlags {
                        raw: true,
                        ..CommandFlags::default()
                    },
                    handler: bot,
                },
                CoreCommand {
                    name: "botlist",
                    help: BOTLIST_HELP,
                    flags: CommandFlags {
                        raw: true,
                        check_current_bot_on: true,
                        ..CommandFlags::default()
                    },
                    handler: botlist,
                },
            ],
        }
    }

    /// Look up a command by name (case-insensitive).
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&CoreCommand> {
        self.commands.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// All command names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|c| c.name)
    }
}

impl Default for CoreCommands {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// ext
// ---------------------------------------------------------------------------

const EXT_HELP: &str = "ext:\n\
.ext // list extensions\n\
.ext <name> // show extension info\n\
.ext <name...> on // switch extensions on (companions follow)\n\
.ext <name...> off // switch extensions off";

fn ext(ctx: &mut CoreContext<'_>) -> CommandOutcome {
    let command = ctx.command;
    let args: Vec<&str> = command.command.args.iter().map(String::as_str).collect();
    let is_toggle = |a: &str| a.eq_ignore_ascii_case("on") || a.eq_ignore_ascii_case("off");

    match args.as_slice() {
        [] => CommandOutcome::reply(ext_list(ctx)),
        [word] if word.eq_ignore_ascii_case("list") => CommandOutcome::reply(ext_list(ctx)),
        [first, names @ ..] if is_toggle(*first) => ext_toggle(ctx, first, names),
        [names @ .., last] if is_toggle(*last) => ext_toggle(ctx, last, names),
        [name] => CommandOutcome::reply(ext_info(ctx.registry, name)),
        _ => CommandOutcome::help(),
    }
}

fn ext_list(ctx: &CoreContext<'_>) -> String {
    let registry = ctx.registry;
    if registry.is_empty() {
        return "No extensions are installed.".to_string();
    }
    let mut lines = vec!["Extensions:".to_string()];
    for (i, capability) in registry.list().iter().enumerate() {
        let state = if ctx.conversation.activation.is_active(capability.name()) {
            "on"
        } else {
            "off"
        };
        let aliases = if capability.aliases().is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", capability.aliases().join(", "))
        };
        lines.push(format!(
            "{}. [{state}] {}{aliases} - {} by {}",
            i.saturating_add(1),
            capability.name(),
            capability.version(),
            capability.author(),
        ));
    }
    lines.join("\n")
}

fn ext_info(registry: &CapabilityRegistry, name: &str) -> String {
    match registry.find(name) {
        Some(capability) => {
            let mut text = format!(
                "[{}] {} {}",
                capability.name(),
                capability.version(),
                capability.author()
            );
            if !capability.description().is_empty() {
                text.push('\n');
                text.push_str(capability.description());
            }
            text
        },
        None => format!("Unknown extension: {name}"),
    }
}

fn ext_toggle(ctx: &mut CoreContext<'_>, switch: &str, names: &[&str]) -> CommandOutcome {
    if !ctx.privilege().at_least(Privilege::Inviter) {
        return CommandOutcome::reply("You need inviter privilege or higher to switch extensions here.");
    }
    if names.is_empty() {
        return CommandOutcome::help();
    }

    if switch.eq_ignore_ascii_case("on") {
        let report = ctx
            .conversation
            .activation
            .activate_requested(ctx.registry, names);
        info!(
            conversation_id = %ctx.conversation.id,
            activated = ?report.activated,
            companions = ?report.companions,
            "Extensions switched on"
        );
        if report.activated.is_empty() {
            return CommandOutcome::reply(format!(
                "No valid extension names: {}",
                report.unknown.join(", ")
            ));
        }
        let mut text = format!("Opened: {}", report.activated.join(", "));
        if !report.companions.is_empty() {
            text.push_str(&format!("\nAlso opened as companions: {}", report.companions.join(", ")));
        }
        if !report.conflicts.is_empty() {
            text.push_str(&format!(
                "\nConflicts with active: {}. For commands with the same name, the later-activated extension wins.",
                report.conflicts.join(", ")
            ));
        }
        if !report.unknown.is_empty() {
            text.push_str(&format!("\nUnknown: {}", report.unknown.join(", ")));
        }
        return CommandOutcome::reply(text);
    }

    let mut closed = Vec::new();
    let mut missing = Vec::new();
    for name in names {
        match ctx
            .conversation
            .activation
            .deactivate_by_name(ctx.registry, name)
        {
            Some(capability) => closed.push(capability.name().to_string()),
            None => missing.push((*name).to_string()),
        }
    }
    info!(conversation_id = %ctx.conversation.id, closed = ?closed, "Extensions switched off");
    let mut parts = Vec::new();
    if !closed.is_empty() {
        parts.push(format!("Closed: {}", closed.join(", ")));
    }
    if !missing.is_empty() {
        parts.push(format!("Already closed or not found: {}", missing.join(", ")));
    }
    CommandOutcome::reply(parts.join("\n"))
}

// ---------------------------------------------------------------------------
// bot
// ---------------------------------------------------------------------------

const BOT_HELP: &str = "bot:\n\
.bot // show status\n\
.bot on // switch the bot on in this conversation\n\
.bot off // switch the bot off in this conversation";

fn bot(ctx: &mut CoreContext<'_>) -> CommandOutcome {
    let command = ctx.command;
    let command = &command.command;
    let switch = match command.arg(1) {
        None => return CommandOutcome::reply(bot_status(ctx)),
        Some(a) if a.eq_ignore_ascii_case("on") => true,
        Some(a) if a.eq_ignore_ascii_case("off") => false,
        Some(_) => return CommandOutcome::help(),
    };

    if ctx.is_private() {
        return CommandOutcome::reply("The bot is always on in private chat.");
    }
    // Addressed to another bot.
    if ctx.addressed_elsewhere() {
        return CommandOutcome::unsolved();
    }
    if !ctx.privilege().at_least(Privilege::Admin) {
        return CommandOutcome::reply("Only conversation admins can switch the bot on or off.");
    }

    ctx.conversation.bot_on = switch;
    info!(conversation_id = %ctx.conversation.id, bot_on = switch, "Bot switched");
    let mut text = if switch {
        "Bot is now on.".to_string()
    } else {
        "Bot is now off.".to_string()
    };
    if switch && ctx.conversation.story_log_on {
        text.push_str("\nNote: a story log is being recorded.");
    }
    CommandOutcome::reply(text)
}

fn bot_status(ctx: &CoreContext<'_>) -> String {
    let active = ctx.conversation.activation.active().len();
    if ctx.is_private() {
        return format!("Private chat: always on. {active} extension(s) active.");
    }
    let state = if ctx.conversation.bot_on { "on" } else { "off" };
    format!("Bot is {state} here. {active} extension(s) active.")
}

// ---------------------------------------------------------------------------
// botlist
// ---------------------------------------------------------------------------

const BOTLIST_HELP: &str = "botlist:\n\
.botlist add @bot // mark accounts as bots; their commands are ignored\n\
.botlist del @bot // unmark\n\
.botlist list // show marked accounts";

fn botlist(ctx: &mut CoreContext<'_>) -> CommandOutcome {
    if ctx.is_private() {
        return CommandOutcome::reply("The bot list only applies in group conversations.");
    }
    let command = ctx.command;
    let command = &command.command;
    let action = command.arg(1).map(str::to_lowercase);

    match action.as_deref() {
        None | Some("list" | "show") => {
            if ctx.conversation.bot_list.is_empty() {
                return CommandOutcome::reply("The bot list is empty.");
            }
            let lines: Vec<String> = ctx
                .conversation
                .bot_list
                .iter()
                .map(|id| format!("- {id}"))
                .collect();
            CommandOutcome::reply(format!("Bot list:\n{}", lines.join("\n")))
        },
        Some(action @ ("add" | "del" | "rm")) => {
            if !ctx.privilege().at_least(Privilege::Inviter) {
                return CommandOutcome::reply("You need inviter privilege or higher to edit the bot list.");
            }
            let bot_id = ctx.bot_id;
            let mut targets: BTreeSet<UserId> = command
                .mentions
                .iter()
                .filter(|m| *m != bot_id)
                .cloned()
                .collect();
            targets.extend(
                command
                    .args
                    .iter()
                    .skip(1)
                    .map(|a| UserId::new(a.trim_start_matches('@')))
                    .filter(|id| id != bot_id && !id.as_str().is_empty()),
            );
            if targets.is_empty() {
                return CommandOutcome::help();
            }

            let names: Vec<String> = targets.iter().map(ToString::to_string).collect();
            if action == "add" {
                ctx.conversation.bot_list.extend(targets);
                info!(conversation_id = %ctx.conversation.id, added = ?names, "Bot list updated");
                CommandOutcome::reply(format!("Added to the bot list: {}", names.join(", ")))
            } else {
                for target in &targets {
                    ctx.conversation.bot_list.remove(target);
                }
                info!(conversation_id = %ctx.conversation.id, removed = ?names, "Bot list updated");
                CommandOutcome::reply(format!("Removed from the bot list: {}", names.join(", ")))
            }
        },
        Some(_) => CommandOutcome::help(),
    }
}
