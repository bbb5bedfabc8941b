//! Capability descriptor.
//!
//! A [`Capability`] is the unit a conversation switches on and off: a named
//! bundle of commands plus optional passive hooks. Descriptors are immutable
//! once registered, except for the open/closed state of their storage handle.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dicebot_config::ExtensionSection;
use dicebot_core::{InboundMessage, ParsedCommand, Privilege, Reply, UserId};
use tracing::{debug, warn};

use crate::error::ExtensionResult;

// ---------------------------------------------------------------------------
// Handler contexts
// ---------------------------------------------------------------------------

/// What a passive hook sees of an inbound message.
#[derive(Debug, Clone)]
pub struct MessageContext {
    /// The message itself.
    pub message: Arc<InboundMessage>,
    /// Sender privilege computed for this message.
    pub privilege: Privilege,
    /// Whether the bot account was mentioned.
    pub bot_mentioned: bool,
    /// Whether the bot is switched on in this conversation.
    pub conversation_active: bool,
}

impl MessageContext {
    /// Whether the message arrived in a private chat.
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.message.is_private()
    }
}

/// What a command handler sees.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// The surrounding message context.
    pub event: MessageContext,
    /// The parsed command.
    pub command: ParsedCommand,
    /// User the command acts on behalf of, for commands that allow delegation.
    pub delegate: Option<UserId>,
}

/// Result of running a command handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// The handler consumed the command.
    pub solved: bool,
    /// The handler asked for its help text to be shown.
    pub show_help: bool,
    /// Replies to deliver.
    pub replies: Vec<Reply>,
}

impl CommandOutcome {
    /// A consumed command with the given replies.
    #[must_use]
    pub fn solved(replies: Vec<Reply>) -> Self {
        Self {
            solved: true,
            show_help: false,
            replies,
        }
    }

    /// A consumed command answered with one line to the sender.
    #[must_use]
    pub fn reply(text: impl Into<String>) -> Self {
        Self::solved(vec![Reply::sender(text)])
    }

    /// A consumed command that wants its help text shown.
    #[must_use]
    pub fn help() -> Self {
        Self {
            solved: true,
            show_help: true,
            replies: Vec::new(),
        }
    }

    /// The handler did not take the command.
    #[must_use]
    pub fn unsolved() -> Self {
        Self::default()
    }
}

/// Command handler.
pub type CommandHandler = Arc<dyn Fn(&CommandContext) -> CommandOutcome + Send + Sync>;
/// Hook fired for every message, or for every non-command message.
pub type MessageHook = Arc<dyn Fn(&MessageContext) -> Vec<Reply> + Send + Sync>;
/// Hook notified of a command before resolution.
pub type CommandNotifier = Arc<dyn Fn(&CommandContext) -> Vec<Reply> + Send + Sync>;
/// Hook that may take over command resolution. A solved outcome wins.
pub type CommandOverride = Arc<dyn Fn(&CommandContext) -> CommandOutcome + Send + Sync>;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Per-capability storage handle, opened lazily and closed on deactivation.
pub trait CapabilityStorage: Send + Sync {
    /// Open the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Storage`](crate::ExtensionError::Storage) on backend failure.
    fn open(&self) -> ExtensionResult<()>;

    /// Flush and close the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`ExtensionError::Storage`](crate::ExtensionError::Storage) on backend failure.
    fn close(&self) -> ExtensionResult<()>;
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Eligibility flags checked before a command handler runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct CommandFlags {
    /// Runs regardless of bot-on state (subject to the two checks below).
    pub raw: bool,
    /// For raw commands: still require bot-on or a private chat.
    pub check_current_bot_on: bool,
    /// For raw commands: refuse when someone other than the bot is mentioned.
    pub check_mention_others: bool,
    /// Refuse in private chats.
    pub disabled_in_private: bool,
    /// A mention of another user makes that user the delegate.
    pub allow_delegate: bool,
}

/// One entry of a capability's command table.
#[derive(Clone)]
pub struct CommandEntry {
    /// Command word (lowercase).
    pub name: String,
    /// Help text.
    pub help: String,
    /// Eligibility flags.
    pub flags: CommandFlags,
    /// The handler.
    pub handler: CommandHandler,
}

impl CommandEntry {
    /// Create an entry with default flags.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CommandContext) -> CommandOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into().to_lowercase(),
            help: String::new(),
            flags: CommandFlags::default(),
            handler: Arc::new(handler),
        }
    }

    /// Set the help text.
    #[must_use]
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Replace the eligibility flags.
    #[must_use]
    pub fn with_flags(mut self, flags: CommandFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Mark as raw (runs while the bot is off).
    #[must_use]
    pub fn raw(mut self) -> Self {
        self.flags.raw = true;
        self
    }

    /// Refuse in private chats.
    #[must_use]
    pub fn disabled_in_private(mut self) -> Self {
        self.flags.disabled_in_private = true;
        self
    }

    /// Allow acting on behalf of a mentioned user.
    #[must_use]
    pub fn allow_delegate(mut self) -> Self {
        self.flags.allow_delegate = true;
        self
    }

    /// Help text, falling back to `name:\n` when none was given.
    #[must_use]
    pub fn help_text(&self) -> String {
        if self.help.is_empty() {
            format!("{}:\n", self.name)
        } else {
            self.help.clone()
        }
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("name", &self.name)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A registered capability ("extension").
pub struct Capability {
    name: String,
    aliases: Vec<String>,
    version: String,
    author: String,
    description: String,
    scripted: bool,
    commands: BTreeMap<String, CommandEntry>,
    companions: Vec<String>,
    conflicts: Vec<String>,
    auto_activate: bool,
    disabled_commands: HashSet<String>,
    on_message_received: Option<MessageHook>,
    on_command_received: Option<CommandNotifier>,
    on_not_command: Option<MessageHook>,
    on_command_override: Option<CommandOverride>,
    storage: Option<Arc<dyn CapabilityStorage>>,
    /// Held across `open`/`close` so concurrent callers wait for a pending open.
    storage_open: Mutex<bool>,
}

impl Capability {
    /// Start building a capability.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CapabilityBuilder {
        CapabilityBuilder::new(name)
    }

    /// Canonical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternative names.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Author.
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Description shown by `ext <name>`.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether hooks must run on the scripting worker.
    #[must_use]
    pub fn is_scripted(&self) -> bool {
        self.scripted
    }

    /// Names of capabilities this one follows into activation (ActiveWith).
    #[must_use]
    pub fn companions(&self) -> &[String] {
        &self.companions
    }

    /// Names of capabilities this one is known to conflict with.
    #[must_use]
    pub fn conflicts(&self) -> &[String] {
        &self.conflicts
    }

    /// Whether the capability activates itself in conversations that have
    /// not decided on it yet.
    #[must_use]
    pub fn auto_activate(&self) -> bool {
        self.auto_activate
    }

    /// Look up a command by word (case-insensitive).
    #[must_use]
    pub fn command(&self, name: &str) -> Option<&CommandEntry> {
        self.commands.get(&name.to_lowercase())
    }

    /// All command words.
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Whether an operator disabled `command` for this capability.
    #[must_use]
    pub fn is_command_disabled(&self, command: &str) -> bool {
        self.disabled_commands.contains(&command.to_lowercase())
    }

    /// Message-received hook.
    #[must_use]
    pub fn on_message_received(&self) -> Option<&MessageHook> {
        self.on_message_received.as_ref()
    }

    /// Command-received notifier.
    #[must_use]
    pub fn on_command_received(&self) -> Option<&CommandNotifier> {
        self.on_command_received.as_ref()
    }

    /// Not-a-command hook.
    #[must_use]
    pub fn on_not_command(&self) -> Option<&MessageHook> {
        self.on_not_command.as_ref()
    }

    /// Command-override hook.
    #[must_use]
    pub fn on_command_override(&self) -> Option<&CommandOverride> {
        self.on_command_override.as_ref()
    }

    /// Whether any hook wants to see ordinary chatter.
    #[must_use]
    pub fn has_passive_listener(&self) -> bool {
        self.on_message_received.is_some() || self.on_not_command.is_some()
    }

    /// Apply an operator override from `[extensions.<name>]`.
    pub fn apply_override(&mut self, section: &ExtensionSection) {
        if let Some(auto) = section.auto_activate {
            self.auto_activate = auto;
        }
        self.disabled_commands
            .extend(section.disabled_commands.iter().map(|c| c.to_lowercase()));
        debug!(
            capability = %self.name,
            auto_activate = self.auto_activate,
            disabled = self.disabled_commands.len(),
            "Applied operator override"
        );
    }

    // -----------------------------------------------------------------
    // Storage lifecycle
    // -----------------------------------------------------------------

    /// Whether the storage handle is currently open.
    #[must_use]
    pub fn storage_is_open(&self) -> bool {
        *self.storage_state()
    }

    fn storage_state(&self) -> MutexGuard<'_, bool> {
        self.storage_open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open the storage handle if the capability has one and it is closed.
    ///
    /// A caller that arrives while another is opening blocks until that
    /// open finishes, so a successful return always means the store is open.
    ///
    /// # Errors
    ///
    /// Propagates the backend's open error.
    pub fn ensure_storage_open(&self) -> ExtensionResult<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };
        let mut open = self.storage_state();
        if *open {
            return Ok(());
        }
        storage.open()?;
        *open = true;
        debug!(capability = %self.name, "Opened capability storage");
        Ok(())
    }

    /// Close the storage handle if it is open. Failures are logged.
    pub fn close_storage(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let mut open = self.storage_state();
        if !*open {
            return;
        }
        *open = false;
        match storage.close() {
            Ok(()) => debug!(capability = %self.name, "Closed capability storage"),
            Err(e) => warn!(capability = %self.name, error = %e, "Failed to close capability storage"),
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("version", &self.version)
            .field("scripted", &self.scripted)
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("companions", &self.companions)
            .field("auto_activate", &self.auto_activate)
            .field("storage_open", &self.storage_is_open())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`Capability`].
#[must_use]
pub struct CapabilityBuilder {
    inner: Capability,
}

impl CapabilityBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Capability {
                name: name.into(),
                aliases: Vec::new(),
                version: "1.0.0".to_string(),
                author: String::new(),
                description: String::new(),
                scripted: false,
                commands: BTreeMap::new(),
                companions: Vec::new(),
                conflicts: Vec::new(),
                auto_activate: false,
                disabled_commands: HashSet::new(),
                on_message_received: None,
                on_command_received: None,
                on_not_command: None,
                on_command_override: None,
                storage: None,
                storage_open: Mutex::new(false),
            },
        }
    }

    /// Add an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.inner.aliases.push(alias.into());
        self
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.inner.version = version.into();
        self
    }

    /// Set the author.
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.inner.author = author.into();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.inner.description = description.into();
        self
    }

    /// Route hooks and handlers through the scripting worker.
    pub fn scripted(mut self) -> Self {
        self.inner.scripted = true;
        self
    }

    /// Add a command with default flags.
    pub fn command<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&CommandContext) -> CommandOutcome + Send + Sync + 'static,
    {
        self.command_entry(CommandEntry::new(name, handler))
    }

    /// Add a fully specified command entry.
    pub fn command_entry(mut self, entry: CommandEntry) -> Self {
        self.inner.commands.insert(entry.name.clone(), entry);
        self
    }

    /// Follow `target` into activation.
    pub fn companion_of(mut self, target: impl Into<String>) -> Self {
        self.inner.companions.push(target.into());
        self
    }

    /// Declare a conflict with `other`.
    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.inner.conflicts.push(other.into());
        self
    }

    /// Set the default auto-activate policy.
    pub fn auto_activate(mut self, auto: bool) -> Self {
        self.inner.auto_activate = auto;
        self
    }

    /// Set the message-received hook.
    pub fn on_message_received<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MessageContext) -> Vec<Reply> + Send + Sync + 'static,
    {
        self.inner.on_message_received = Some(Arc::new(hook));
        self
    }

    /// Set the command-received notifier.
    pub fn on_command_received<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommandContext) -> Vec<Reply> + Send + Sync + 'static,
    {
        self.inner.on_command_received = Some(Arc::new(hook));
        self
    }

    /// Set the not-a-command hook.
    pub fn on_not_command<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MessageContext) -> Vec<Reply> + Send + Sync + 'static,
    {
        self.inner.on_not_command = Some(Arc::new(hook));
        self
    }

    /// Set the command-override hook.
    pub fn on_command_override<F>(mut self, hook: F) -> Self
    where
        F: Fn(&CommandContext) -> CommandOutcome + Send + Sync + 'static,
    {
        self.inner.on_command_override = Some(Arc::new(hook));
        self
    }

    /// Attach a storage handle.
    pub fn storage(mut self, storage: Arc<dyn CapabilityStorage>) -> Self {
        self.inner.storage = Some(storage);
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Capability {
        self.inner
    }
}
