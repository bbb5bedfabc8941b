//! The message dispatch pipeline.
//!
//! [`Dispatcher::dispatch`] takes one normalized message through these
//! stages, in order:
//!
//! 1. resolve (or auto-create) the conversation record and lock it
//! 2. catch up with newly registered capabilities
//! 3. decide whether the message needs any processing at all
//! 4. compute the sender's privilege
//! 5. ban-list gate
//! 6. message-received hooks of active capabilities
//! 7. collect candidate command names (core and active capabilities)
//! 8. parse the text as a command
//! 9. content filter
//! 10. not a command: not-a-command hooks
//! 11. command: bot-list filtering, then overrides or resolution
//! 12. resolution: notifiers, core table, active capability tables
//! 13. rate-limit gate for resolved commands
//! 14. endpoint and member counters
//!
//! The whole run is wrapped in `catch_unwind`; a panic anywhere ends only
//! that message, with a generic failure reply.
//!
//! # Locking
//!
//! The conversation mutex is held for the entire run so messages in one
//! conversation are strictly ordered. The registry is never locked across a
//! run: each message clones an `Arc` snapshot under a brief read lock, and
//! registration swaps in a new version under the write lock. A slow handler
//! in one conversation therefore never holds up registration or other
//! conversations.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dicebot_config::{BanSection, Config, DispatchSection};
use dicebot_core::{
    InboundMessage, Privilege, PrivilegeInputs, Reply, ReplySurface, UserId, deliver,
};
use dicebot_extensions::{
    ActivationSnapshot, Capability, CapabilityRegistry, CommandContext, CommandFlags,
    CommandOutcome, MessageContext, MessageHook,
};
use dicebot_gates::{
    BanList, ContentFilter, GateAction, RateLimitOutcome, RateLimiter, evaluate_ban,
};
use dicebot_hooks::{
    HookBridge, HookError, HookPoint, install_backtrace_capture, panic_message, take_panic_backtrace,
};
use dicebot_telemetry::TraceContext;
use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, warn};

use crate::conversation::{Conversation, ConversationStore};
use crate::core_commands::{CoreCommands, CoreContext};
use crate::error::DispatchResult;
use crate::parser::CommandParser;
use crate::stats::EndpointStats;

/// Sent when handling a message panicked or a handler failed.
const FAILURE_REPLY: &str = "Something went wrong while handling that. The operators have the details in the log.";

/// How a message left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing in the conversation needed the message.
    Skipped,
    /// Stopped by the ban-list gate.
    Refused,
    /// Stopped by the content filter.
    Censored,
    /// The sender, or a bot the command mentions, is on the bot list.
    IgnoredBot,
    /// Not a command; passive hooks ran where eligible.
    NotCommand,
    /// A command was resolved.
    Solved {
        /// Command word.
        command: String,
    },
    /// A command attempt nobody resolved.
    Unsolved {
        /// Command word.
        command: String,
    },
    /// A resolved command was denied by the rate limiter.
    RateLimited {
        /// Command word.
        command: String,
        /// The limiter's decision.
        outcome: RateLimitOutcome,
    },
    /// Handling panicked.
    Failed,
}

enum Eligibility {
    Skip,
    Refuse(Reply),
    Disabled,
    Run(Option<UserId>),
}

/// Owns the registry, conversations and gates, and runs the pipeline.
pub struct Dispatcher {
    settings: DispatchSection,
    bot_id: UserId,
    masters: HashSet<UserId>,
    leave_delay: Duration,
    registry: RwLock<Arc<CapabilityRegistry>>,
    conversations: ConversationStore,
    bridge: HookBridge,
    ban_section: BanSection,
    ban_list: Arc<BanList>,
    rate_limiter: RateLimiter,
    censor: ContentFilter,
    parser: CommandParser,
    core: CoreCommands,
    stats: EndpointStats,
    surface: Arc<dyn ReplySurface>,
}

impl Dispatcher {
    /// Assemble a dispatcher from configuration.
    ///
    /// The hook bridge is started from `[scripting]`; when scripting is
    /// enabled this must run inside a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the content filter's word lists do not compile.
    pub fn new(
        config: &Config,
        registry: CapabilityRegistry,
        surface: Arc<dyn ReplySurface>,
    ) -> DispatchResult<Self> {
        let censor = ContentFilter::from_section(&config.censor)?;
        install_backtrace_capture();
        let dispatcher = Self {
            settings: config.dispatch.clone(),
            bot_id: UserId::new(config.dispatch.bot_id.as_str()),
            masters: config
                .dispatch
                .masters
                .iter()
                .map(|m| UserId::new(m.as_str()))
                .collect(),
            leave_delay: Duration::from_millis(config.dispatch.leave_delay_ms),
            registry: RwLock::new(Arc::new(registry)),
            conversations: ConversationStore::new(),
            bridge: HookBridge::new(&config.scripting),
            ban_section: config.ban.clone(),
            ban_list: Arc::new(BanList::new(&config.ban)),
            rate_limiter: RateLimiter::from_section(&config.rate_limit),
            censor,
            parser: CommandParser::from_section(&config.dispatch),
            core: CoreCommands::builtin(),
            stats: EndpointStats::new(),
            surface,
        };
        info!(
            bot_id = %dispatcher.bot_id,
            masters = dispatcher.masters.len(),
            prefixes = ?dispatcher.parser.prefixes(),
            rate_limit = dispatcher.rate_limiter.is_enabled(),
            "Dispatcher ready"
        );
        Ok(dispatcher)
    }

    /// Replace the hook bridge.
    #[must_use]
    pub fn with_bridge(mut self, bridge: HookBridge) -> Self {
        self.bridge = bridge;
        self
    }

    /// Share an existing ban list.
    #[must_use]
    pub fn with_ban_list(mut self, ban_list: Arc<BanList>) -> Self {
        self.ban_list = ban_list;
        self
    }

    /// Register a capability.
    ///
    /// Conversations pick it up on their next message.
    ///
    /// # Errors
    ///
    /// Returns an error on a name or alias collision.
    pub async fn register(&self, capability: Capability) -> DispatchResult<Arc<Capability>> {
        let mut registry = self.registry.write().await;
        let registered = Arc::make_mut(&mut *registry).register(capability)?;
        debug!(
            capability = %registered.name(),
            version = registry.version(),
            "Conversations will pick up capability on their next message"
        );
        Ok(registered)
    }

    /// Snapshot of the capability registry as of now.
    pub async fn registry(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&*self.registry.read().await)
    }

    /// Known conversations.
    #[must_use]
    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// The shared ban list.
    #[must_use]
    pub fn ban_list(&self) -> &Arc<BanList> {
        &self.ban_list
    }

    /// Command counters.
    #[must_use]
    pub fn stats(&self) -> &EndpointStats {
        &self.stats
    }

    /// The bot's own account.
    #[must_use]
    pub fn bot_id(&self) -> &UserId {
        &self.bot_id
    }

    /// Activation snapshot of a conversation, for persistence.
    pub async fn snapshot(&self, id: &dicebot_core::ConversationId) -> Option<ActivationSnapshot> {
        let record = self.conversations.get(id)?;
        let conversation = record.lock().await;
        Some(conversation.activation.snapshot())
    }

    /// Install a conversation restored from persistence, replaying its
    /// activation snapshot against the current registry.
    pub async fn restore_conversation(&self, mut conversation: Conversation, first_load: &HashSet<String>) {
        let registry = self.registry().await;
        let capabilities = registry.list().to_vec();
        conversation
            .activation
            .activate_batch_by_snapshot_order(&registry, &capabilities, first_load);
        debug!(
            conversation_id = %conversation.id,
            active = ?conversation.activation.active_names(),
            "Conversation restored"
        );
        self.conversations.insert(conversation);
    }

    // -----------------------------------------------------------------------
    // Entry point
    // -----------------------------------------------------------------------

    /// Run one message through the pipeline.
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let trace = TraceContext::new(
            message.conversation_id.as_str(),
            message.sender.id.as_str(),
            message.platform.as_str(),
        );
        let span = trace.span();
        let message = Arc::new(message);

        let result = AssertUnwindSafe(self.process(Arc::clone(&message)))
            .catch_unwind()
            .instrument(span.clone())
            .await;

        match result {
            Ok(outcome) => {
                debug!(parent: &span, elapsed_ms = trace.elapsed_ms(), ?outcome, "Message handled");
                outcome
            },
            Err(panic) => {
                let backtrace = take_panic_backtrace();
                error!(
                    parent: &span,
                    panic = %panic_message(panic.as_ref()),
                    backtrace = backtrace.as_deref().unwrap_or("unavailable"),
                    "Panic while handling message"
                );
                deliver(self.surface.as_ref(), &message, &[Reply::sender(FAILURE_REPLY)]).await;
                DispatchOutcome::Failed
            },
        }
    }

    async fn process(&self, message: Arc<InboundMessage>) -> DispatchOutcome {
        // Stage 1: conversation.
        let auto_on = self.settings.auto_on_for(message.platform.as_str());
        let (record, created) = self.conversations.get_or_create(&message, auto_on);
        if created && !message.is_private() && self.settings.notify_on_new_conversation {
            let notice = format!(
                "Auto-activated: found unrecorded conversation {} on {}, bot on: {auto_on}",
                message.conversation_id, message.platform
            );
            deliver(self.surface.as_ref(), &message, &[Reply::NotifyOperators(notice)]).await;
        }
        let mut conversation = record.lock().await;
        let registry = self.registry().await;

        // Stage 2: registry catch-up.
        conversation.activation.sync_on_message(&registry);

        // Stage 3: context heuristic.
        let bot_mentioned = message.mentions_user(&self.bot_id);
        let maybe_command = self.parser.has_prefix(&message.text);
        if !self.needs_context(&conversation, &message, maybe_command, bot_mentioned) {
            return DispatchOutcome::Skipped;
        }

        // Stage 4: privilege.
        let inputs = PrivilegeInputs {
            role: message.sender.role,
            is_private: message.is_private(),
            is_inviter: conversation.inviter.as_ref() == Some(&message.sender.id),
            ban_rank: self.ban_list.rank_of(message.sender.id.as_str()),
            is_master: self.masters.contains(&message.sender.id),
        };
        let privilege = Privilege::compute(&inputs);
        let role_level = Privilege::from_role(&inputs).level();

        // Stage 5: ban-list gate.
        let verdict = evaluate_ban(
            &self.ban_section,
            &self.ban_list,
            &message,
            privilege,
            role_level,
            self.leave_delay,
        );
        self.perform(&message, verdict.actions).await;
        if !verdict.proceed {
            return DispatchOutcome::Refused;
        }

        let bot_on = conversation.is_active();
        let event = MessageContext {
            message: Arc::clone(&message),
            privilege,
            bot_mentioned,
            conversation_active: bot_on,
        };
        let active: Vec<Arc<Capability>> = conversation.activation.active().to_vec();

        // Stage 6: message-received hooks.
        if bot_on && privilege != Privilege::Banned {
            for capability in &active {
                if let Some(hook) = capability.on_message_received() {
                    let replies = self
                        .run_message_hook(capability, HookPoint::MessageReceived, hook, &event)
                        .await;
                    self.send_replies(&message, replies).await;
                }
            }
        }

        // Stages 7 and 8: candidates and parsing.
        let parsed = if maybe_command {
            let candidates = self.candidates(&active);
            self.parser.parse(&message.text, &candidates, &message.mentions)
        } else {
            None
        };
        // Addressing the bot as the first mention wakes it for this command.
        let bot_mentioned_first = message.mentions.first() == Some(&self.bot_id);
        let bot_on_for_command = bot_on || (parsed.is_some() && bot_mentioned_first);

        // Stage 9: content filter.
        if self
            .censor
            .inspects_input(parsed.is_some(), message.is_private(), bot_on_for_command)
        {
            let verdict = self
                .censor
                .check(&message, conversation.inviter.as_ref(), &self.ban_list);
            if verdict.is_hit() {
                info!(
                    level = ?verdict.level,
                    words = ?verdict.words,
                    terminate = verdict.terminate,
                    "Refusing message with blocked words"
                );
                self.perform(&message, verdict.actions).await;
                if !verdict.terminate
                    && let Some(text) = verdict
                        .level
                        .and_then(|level| self.censor.refusal(parsed.is_some(), level))
                {
                    deliver(self.surface.as_ref(), &message, &[Reply::sender(text)]).await;
                }
                return DispatchOutcome::Censored;
            }
        }

        // Stage 10: not a command.
        let Some(command) = parsed else {
            return self
                .handle_not_command(&conversation, &active, &event)
                .await;
        };

        // Stage 11: command.
        let word = command.command.clone();
        if !message.is_private() && word != "botlist" && !bot_mentioned {
            if conversation.is_known_bot(&message.sender.id) {
                info!(command = %word, "Ignoring command from a listed bot");
                return DispatchOutcome::IgnoredBot;
            }
            if command
                .mentions
                .iter()
                .any(|m| *m != self.bot_id && conversation.is_known_bot(m))
            {
                info!(command = %word, "Ignoring command addressed to a listed bot");
                return DispatchOutcome::IgnoredBot;
            }
        }
        info!(command = %word, "Command received");

        let mut ctx = CommandContext {
            event,
            command,
            delegate: None,
        };
        let overridden = if bot_on_for_command {
            self.run_overrides(&active, &ctx).await
        } else {
            None
        };
        let (solved, replies) = match overridden {
            Some(outcome) => (true, outcome.replies),
            None => {
                self.resolve_command(&mut conversation, &registry, &active, &mut ctx, bot_on_for_command)
                    .await
            },
        };

        if !solved {
            info!(command = %word, "Ignored command (bot off, extension off or unknown command)");
            self.send_replies(&message, replies).await;
            return DispatchOutcome::Unsolved { command: word };
        }

        // Stage 13: rate limit.
        let rate = self.rate_limiter.check(
            &mut conversation.rate_limit,
            &message,
            privilege,
            &self.ban_list,
            Instant::now(),
        );
        if rate.is_denied() {
            info!(command = %word, outcome = ?rate, "Command rate limited, dropping replies");
            self.perform(&message, rate.actions(&message)).await;
            return DispatchOutcome::RateLimited {
                command: word,
                outcome: rate,
            };
        }
        self.send_replies(&message, replies).await;

        // Stage 14: counters.
        let now = Utc::now();
        self.stats.record_command(&message.platform, now);
        conversation.record_command(&message.sender.id, &message.sender.nickname, now);
        DispatchOutcome::Solved { command: word }
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn needs_context(
        &self,
        conversation: &Conversation,
        message: &InboundMessage,
        maybe_command: bool,
        bot_mentioned: bool,
    ) -> bool {
        conversation.story_log_on
            || self.settings.custom_reply_enabled
            || conversation
                .activation
                .active()
                .iter()
                .any(|c| c.has_passive_listener())
            || maybe_command
            || message.is_private()
            || bot_mentioned
    }

    fn candidates(&self, active: &[Arc<Capability>]) -> Vec<String> {
        let mut names: Vec<String> = self.core.names().map(str::to_string).collect();
        for capability in active {
            names.extend(capability.command_names().map(str::to_string));
        }
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();
        names
    }

    async fn handle_not_command(
        &self,
        conversation: &Conversation,
        active: &[Arc<Capability>],
        event: &MessageContext,
    ) -> DispatchOutcome {
        let message = &event.message;
        if event.privilege == Privilege::Banned {
            return DispatchOutcome::NotCommand;
        }
        if !message.is_private() && conversation.is_known_bot(&message.sender.id) {
            return DispatchOutcome::IgnoredBot;
        }
        if conversation.is_active() || event.bot_mentioned {
            for capability in active {
                if let Some(hook) = capability.on_not_command() {
                    let replies = self
                        .run_message_hook(capability, HookPoint::NotCommand, hook, event)
                        .await;
                    self.send_replies(message, replies).await;
                }
            }
        }
        DispatchOutcome::NotCommand
    }

    async fn run_overrides(
        &self,
        active: &[Arc<Capability>],
        ctx: &CommandContext,
    ) -> Option<CommandOutcome> {
        for capability in active {
            let Some(hook) = capability.on_command_override() else {
                continue;
            };
            let hook = Arc::clone(hook);
            let call = ctx.clone();
            match self
                .bridge
                .invoke(capability, HookPoint::CommandOverride, move || hook(&call))
                .await
            {
                Ok(outcome) if outcome.solved => {
                    debug!(capability = %capability.name(), "Command overridden");
                    return Some(outcome);
                },
                Ok(_) | Err(HookError::Disabled { .. }) => {},
                Err(e) => warn!(capability = %capability.name(), error = %e, "Command override failed"),
            }
        }
        None
    }

    /// Stage 12. Returns whether the command was handled and the replies to
    /// send if it stands.
    async fn resolve_command(
        &self,
        conversation: &mut Conversation,
        registry: &CapabilityRegistry,
        active: &[Arc<Capability>],
        ctx: &mut CommandContext,
        bot_on: bool,
    ) -> (bool, Vec<Reply>) {
        let message = Arc::clone(&ctx.event.message);

        if bot_on {
            for capability in active {
                if let Some(notifier) = capability.on_command_received() {
                    let notifier = Arc::clone(notifier);
                    let call = ctx.clone();
                    match self
                        .bridge
                        .invoke(capability, HookPoint::CommandReceived, move || notifier(&call))
                        .await
                    {
                        Ok(replies) => self.send_replies(&message, replies).await,
                        Err(HookError::Disabled { .. }) => {},
                        Err(e) => warn!(capability = %capability.name(), error = %e, "Command notifier failed"),
                    }
                }
            }
        }

        let mut replies = Vec::new();
        let word = ctx.command.command.clone();

        if let Some(core) = self.core.find(&word) {
            match self.eligibility(&core.flags, ctx, bot_on, false) {
                Eligibility::Run(delegate) => {
                    ctx.delegate = delegate;
                    let mut core_ctx = CoreContext {
                        conversation: &mut *conversation,
                        registry,
                        command: &*ctx,
                        bot_id: &self.bot_id,
                    };
                    let outcome = (core.handler)(&mut core_ctx);
                    if outcome.solved {
                        replies.extend(outcome.replies);
                        if outcome.show_help {
                            replies.push(Reply::sender(core.help));
                        }
                        return (true, replies);
                    }
                },
                Eligibility::Refuse(reply) => replies.push(reply),
                Eligibility::Skip | Eligibility::Disabled => {},
            }
        }

        for capability in active {
            let Some(entry) = capability.command(&word) else {
                continue;
            };
            let disabled = capability.is_command_disabled(&entry.name);
            match self.eligibility(&entry.flags, ctx, bot_on, disabled) {
                Eligibility::Skip => continue,
                Eligibility::Refuse(reply) => {
                    replies.push(reply);
                    continue;
                },
                Eligibility::Disabled => {
                    replies.push(Reply::sender(format!(
                        "Command disabled by operator: {}:{}",
                        capability.name(),
                        entry.name
                    )));
                    return (true, replies);
                },
                Eligibility::Run(delegate) => ctx.delegate = delegate,
            }

            let handler = Arc::clone(&entry.handler);
            let call = ctx.clone();
            match self
                .bridge
                .invoke(capability, HookPoint::Command, move || handler(&call))
                .await
            {
                Ok(outcome) if outcome.solved => {
                    debug!(capability = %capability.name(), command = %word, "Command solved");
                    replies.extend(outcome.replies);
                    if outcome.show_help {
                        replies.push(Reply::sender(entry.help_text()));
                    }
                    return (true, replies);
                },
                Ok(_) | Err(HookError::Disabled { .. }) => {},
                Err(e) => {
                    error!(capability = %capability.name(), command = %word, error = %e, "Command handler failed");
                    replies.push(Reply::sender(FAILURE_REPLY));
                    return (true, replies);
                },
            }
        }

        (false, replies)
    }

    fn eligibility(
        &self,
        flags: &CommandFlags,
        ctx: &CommandContext,
        bot_on: bool,
        operator_disabled: bool,
    ) -> Eligibility {
        let message = &ctx.event.message;
        let mentions_others = message.mentions_someone_else(&self.bot_id);

        if flags.raw {
            if flags.check_current_bot_on && !bot_on {
                return Eligibility::Skip;
            }
            if flags.check_mention_others && mentions_others {
                return Eligibility::Skip;
            }
        } else if !bot_on {
            return Eligibility::Skip;
        }

        if operator_disabled {
            return Eligibility::Disabled;
        }

        if flags.raw {
            return Eligibility::Run(None);
        }
        if flags.disabled_in_private && message.is_private() {
            return Eligibility::Refuse(Reply::sender("This command is not available in private chat."));
        }
        if flags.allow_delegate {
            let delegate = message
                .mentions
                .iter()
                .rev()
                .find(|m| **m != self.bot_id)
                .cloned();
            return Eligibility::Run(delegate);
        }
        if mentions_others {
            return Eligibility::Skip;
        }
        Eligibility::Run(None)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn run_message_hook(
        &self,
        capability: &Arc<Capability>,
        point: HookPoint,
        hook: &MessageHook,
        event: &MessageContext,
    ) -> Vec<Reply> {
        let hook = Arc::clone(hook);
        let call = event.clone();
        match self.bridge.invoke(capability, point, move || hook(&call)).await {
            Ok(replies) => replies,
            Err(HookError::Disabled { .. }) => Vec::new(),
            Err(e) => {
                warn!(capability = %capability.name(), %point, error = %e, "Hook failed");
                Vec::new()
            },
        }
    }

    async fn send_replies(&self, message: &InboundMessage, replies: Vec<Reply>) {
        if replies.is_empty() {
            return;
        }
        let replies = self.censor.censor_outbound(replies);
        deliver(self.surface.as_ref(), message, &replies).await;
    }

    async fn perform(&self, message: &InboundMessage, actions: Vec<GateAction>) {
        for action in actions {
            if let GateAction::LeaveConversation { delay } = action {
                let surface = Arc::clone(&self.surface);
                let conversation = message.conversation_id.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    match surface.leave_conversation(&conversation).await {
                        Ok(()) => info!(conversation_id = %conversation, "Left conversation"),
                        Err(e) => warn!(conversation_id = %conversation, error = %e, "Failed to leave conversation"),
                    }
                });
            } else if let Some(reply) = action.as_reply() {
                deliver(self.surface.as_ref(), message, &[reply]).await;
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot_id", &self.bot_id)
            .field("conversations", &self.conversations.len())
            .field("ban_list", &self.ban_list.len())
            .field("scripting", &self.bridge.scripting_enabled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebot_test::{BOT_ID, RecordingReplySurface, echo_capability, group_message};

    fn dispatcher() -> Dispatcher {
        let mut config = Config::default();
        config.dispatch.bot_id = BOT_ID.to_string();
        config.scripting.enabled = false;
        Dispatcher::new(
            &config,
            CapabilityRegistry::new(),
            Arc::new(RecordingReplySurface::new()),
        )
        .unwrap()
    }

    fn context(message: InboundMessage) -> CommandContext {
        CommandContext {
            event: MessageContext {
                message: Arc::new(message),
                privilege: Privilege::Default,
                bot_mentioned: false,
                conversation_active: true,
            },
            command: dicebot_core::ParsedCommand::default(),
            delegate: None,
        }
    }

    #[test]
    fn test_candidates_longest_first_without_duplicates() {
        let d = dispatcher();
        let a = Arc::new(echo_capability("a", "ra").build());
        let b = Arc::new(echo_capability("b", "ra").command("rav", |_| CommandOutcome::unsolved()).build());
        let names = d.candidates(&[a, b]);
        assert_eq!(names.first().map(String::as_str), Some("botlist"));
        assert_eq!(names.iter().filter(|n| *n == "ra").count(), 1);
        let rav = names.iter().position(|n| n == "rav").unwrap();
        let ra = names.iter().position(|n| n == "ra").unwrap();
        assert!(rav < ra);
    }

    #[test]
    fn test_plain_command_needs_bot_on() {
        let d = dispatcher();
        let ctx = context(group_message("QQ:2", ".r"));
        let flags = CommandFlags::default();
        assert!(matches!(d.eligibility(&flags, &ctx, false, false), Eligibility::Skip));
        assert!(matches!(d.eligibility(&flags, &ctx, true, false), Eligibility::Run(None)));
        assert!(matches!(d.eligibility(&flags, &ctx, true, true), Eligibility::Disabled));
    }

    #[test]
    fn test_mentioning_someone_else_skips_unless_delegated() {
        let d = dispatcher();
        let other = UserId::new("QQ:3");
        let message = InboundMessage::builder(
            dicebot_core::ConversationId::new(dicebot_test::GROUP_ID),
            dicebot_core::Platform::new("QQ"),
            dicebot_core::Sender::new(UserId::new("QQ:2"), "alice"),
            ".r",
        )
        .mention(other.clone())
        .mention(UserId::new(BOT_ID))
        .build();
        let ctx = context(message);

        let plain = CommandFlags::default();
        assert!(matches!(d.eligibility(&plain, &ctx, true, false), Eligibility::Skip));

        let delegated = CommandFlags {
            allow_delegate: true,
            ..CommandFlags::default()
        };
        match d.eligibility(&delegated, &ctx, true, false) {
            Eligibility::Run(Some(delegate)) => assert_eq!(delegate, other),
            _ => panic!("expected a delegate"),
        }
    }

    #[test]
    fn test_private_only_refusal() {
        let d = dispatcher();
        let ctx = context(dicebot_test::private_message("QQ:2", ".r"));
        let flags = CommandFlags {
            disabled_in_private: true,
            ..CommandFlags::default()
        };
        assert!(matches!(d.eligibility(&flags, &ctx, true, false), Eligibility::Refuse(_)));
    }
}
