//! End-to-end tests for the dispatch pipeline.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dicebot_config::{CensorMode, Config};
use dicebot_core::{BanRank, ConversationId, InboundMessage, Platform, Sender, SenderRole, UserId};
use dicebot_dispatch::{Conversation, DispatchOutcome, Dispatcher};
use dicebot_extensions::{ActivationSnapshot, Capability, CapabilityRegistry, CommandEntry, CommandOutcome};
use dicebot_gates::{RateLimitOutcome, RateScope};
use dicebot_hooks::HookBridge;
use dicebot_test::{
    BOT_ID, GROUP_ID, PLATFORM, RecordingReplySurface, counting_capability, echo_capability,
    group_message, init_test_logging, private_message,
};

fn config() -> Config {
    let mut config = Config::default();
    config.dispatch.bot_id = BOT_ID.to_string();
    config.scripting.enabled = false;
    config
}

fn dispatcher_with(config: &Config, capabilities: Vec<Capability>) -> (Dispatcher, RecordingReplySurface) {
    init_test_logging();
    let surface = RecordingReplySurface::new();
    let mut registry = CapabilityRegistry::new();
    for capability in capabilities {
        registry.register(capability).unwrap();
    }
    let dispatcher = Dispatcher::new(config, registry, Arc::new(surface.clone())).unwrap();
    (dispatcher, surface)
}

fn admin_message(sender: &str, text: &str) -> dicebot_core::InboundMessageBuilder {
    InboundMessage::builder(
        ConversationId::new(GROUP_ID),
        Platform::new(PLATFORM),
        Sender::new(UserId::new(sender), sender).with_role(SenderRole::Admin),
        text,
    )
}

fn solved(command: &str) -> DispatchOutcome {
    DispatchOutcome::Solved {
        command: command.to_string(),
    }
}

fn unsolved(command: &str) -> DispatchOutcome {
    DispatchOutcome::Unsolved {
        command: command.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_capability_registered_later_is_picked_up_on_next_message() {
    let (dispatcher, surface) = dispatcher_with(&config(), vec![]);

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r d20")).await, unsolved("r"));

    dispatcher
        .register(echo_capability("dice", "r").auto_activate(true).build())
        .await
        .unwrap();
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r d20")).await, solved("r"));
    assert_eq!(surface.replies().last().map(String::as_str), Some("dice:r d20"));
}

#[tokio::test]
async fn test_new_group_conversation_notifies_operators_once() {
    let (dispatcher, surface) = dispatcher_with(&config(), vec![]);
    dispatcher.dispatch(group_message("QQ:2", ".r")).await;
    dispatcher.dispatch(group_message("QQ:3", ".r")).await;
    let notices = surface.notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains(GROUP_ID));
}

#[tokio::test]
async fn test_ext_on_activates_companions_at_higher_priority() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            echo_capability("coc7", "ra").build(),
            echo_capability("story", "log").companion_of("coc7").build(),
        ],
    );

    assert_eq!(dispatcher.dispatch(admin_message("QQ:2", ".ra 50").build()).await, unsolved("ra"));

    assert_eq!(
        dispatcher.dispatch(admin_message("QQ:2", ".ext coc7 on").build()).await,
        solved("ext")
    );
    let reply = surface.replies().pop().unwrap();
    assert!(reply.contains("Opened: coc7"), "{reply}");
    assert!(reply.contains("Also opened as companions: story"), "{reply}");

    assert_eq!(dispatcher.dispatch(group_message("QQ:3", ".ra50")).await, solved("ra"));
    assert_eq!(surface.replies().pop().as_deref(), Some("coc7:ra 50"));
    assert_eq!(dispatcher.dispatch(group_message("QQ:3", ".log")).await, solved("log"));

    let snapshot = dispatcher.snapshot(&ConversationId::new(GROUP_ID)).await.unwrap();
    assert_eq!(snapshot.active, vec!["story".to_string(), "coc7".to_string()]);
}

#[tokio::test]
async fn test_ext_on_requires_inviter() {
    let (dispatcher, surface) = dispatcher_with(&config(), vec![echo_capability("coc7", "ra").build()]);
    dispatcher.dispatch(group_message("QQ:2", ".ext coc7 on")).await;
    assert!(surface.replies().pop().unwrap().contains("inviter privilege"));
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".ra")).await, unsolved("ra"));
}

#[tokio::test]
async fn test_ext_off_then_later_sync_keeps_it_off() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );
    dispatcher.dispatch(admin_message("QQ:2", ".ext dice off").build()).await;
    assert_eq!(surface.replies().pop().as_deref(), Some("Closed: dice"));

    dispatcher
        .register(echo_capability("other", "o").auto_activate(true).build())
        .await
        .unwrap();
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r")).await, unsolved("r"));
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".o")).await, solved("o"));
}

#[tokio::test]
async fn test_restored_conversation_keeps_snapshot_order() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            echo_capability("a", "x").build(),
            echo_capability("b", "x").build(),
            echo_capability("c", "x").build(),
        ],
    );
    let version = dispatcher.registry().await.version();
    let snapshot = ActivationSnapshot {
        active: vec!["c".to_string(), "a".to_string()],
        inactivated: BTreeSet::from(["b".to_string()]),
        applied_version: version,
    };
    let conversation =
        Conversation::from_message(&group_message("QQ:2", "hi"), true).with_snapshot(snapshot);
    dispatcher.restore_conversation(conversation, &HashSet::new()).await;

    let id = ConversationId::new(GROUP_ID);
    assert_eq!(
        dispatcher.snapshot(&id).await.unwrap().active,
        vec!["c".to_string(), "a".to_string()]
    );

    // The highest-priority capability answers a shared command.
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".x")).await, solved("x"));
    assert_eq!(surface.replies().pop().as_deref(), Some("c:x"));
}

// ---------------------------------------------------------------------------
// Bot switch and addressing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_bot_off_silences_commands_until_mentioned() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );

    assert_eq!(dispatcher.dispatch(admin_message("QQ:2", ".bot off").build()).await, solved("bot"));
    assert_eq!(surface.replies().pop().as_deref(), Some("Bot is now off."));

    assert_eq!(dispatcher.dispatch(group_message("QQ:3", ".r")).await, unsolved("r"));

    let mentioned = InboundMessage::builder(
        ConversationId::new(GROUP_ID),
        Platform::new(PLATFORM),
        Sender::new(UserId::new("QQ:3"), "carol"),
        ".r",
    )
    .mention(UserId::new(BOT_ID))
    .build();
    assert_eq!(dispatcher.dispatch(mentioned).await, solved("r"));

    assert_eq!(dispatcher.dispatch(group_message("QQ:3", ".bot on")).await, solved("bot"));
    assert!(surface.replies().pop().unwrap().contains("Only conversation admins"));
}

#[tokio::test]
async fn test_only_a_leading_bot_mention_wakes_it() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            Capability::builder("dice")
                .auto_activate(true)
                .command_entry(
                    CommandEntry::new("rh", |ctx| {
                        let target = ctx.delegate.as_ref().map_or("self", |d| d.as_str());
                        CommandOutcome::reply(format!("rolled for {target}"))
                    })
                    .allow_delegate(),
                )
                .build(),
        ],
    );
    dispatcher.dispatch(admin_message("QQ:2", ".bot off").build()).await;

    let addressed = |mentions: &[&str]| {
        mentions
            .iter()
            .fold(admin_message("QQ:3", ".rh"), |b, m| b.mention(UserId::new(*m)))
            .build()
    };

    assert_eq!(dispatcher.dispatch(addressed(&["QQ:9", BOT_ID])).await, unsolved("rh"));
    assert_eq!(dispatcher.dispatch(addressed(&[BOT_ID, "QQ:9"])).await, solved("rh"));
    assert_eq!(surface.replies().pop().as_deref(), Some("rolled for QQ:9"));
}

#[tokio::test]
async fn test_passive_hooks_follow_bot_switch() {
    let (builder, seen) = counting_capability("listener");
    let (dispatcher, _surface) = dispatcher_with(&config(), vec![builder.auto_activate(true).build()]);

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", "hello")).await, DispatchOutcome::NotCommand);
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    dispatcher.dispatch(admin_message("QQ:2", ".bot off").build()).await;
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", "hello")).await, DispatchOutcome::NotCommand);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_plain_chatter_without_listeners_is_skipped() {
    let (dispatcher, surface) = dispatcher_with(&config(), vec![]);
    assert_eq!(dispatcher.dispatch(group_message("QQ:2", "hello")).await, DispatchOutcome::Skipped);
    assert!(surface.replies().is_empty());
}

#[tokio::test]
async fn test_listed_bot_is_ignored() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );
    let other_bot = UserId::new("QQ:77");

    let add = admin_message("QQ:2", ".botlist add")
        .mention(other_bot.clone())
        .build();
    assert_eq!(dispatcher.dispatch(add).await, solved("botlist"));
    assert_eq!(surface.replies().pop().as_deref(), Some("Added to the bot list: QQ:77"));

    assert_eq!(dispatcher.dispatch(group_message("QQ:77", ".r")).await, DispatchOutcome::IgnoredBot);

    let addressed = InboundMessage::builder(
        ConversationId::new(GROUP_ID),
        Platform::new(PLATFORM),
        Sender::new(UserId::new("QQ:2"), "alice"),
        ".r",
    )
    .mention(other_bot)
    .build();
    assert_eq!(dispatcher.dispatch(addressed).await, DispatchOutcome::IgnoredBot);
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_command_burst_warns_then_penalizes() {
    let mut config = config();
    config.rate_limit.enabled = true;
    let (dispatcher, surface) = dispatcher_with(
        &config,
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );

    for _ in 0..3 {
        assert_eq!(dispatcher.dispatch(private_message("QQ:2", ".r")).await, solved("r"));
    }
    assert_eq!(surface.replies().len(), 3);

    assert_eq!(
        dispatcher.dispatch(private_message("QQ:2", ".r")).await,
        DispatchOutcome::RateLimited {
            command: "r".to_string(),
            outcome: RateLimitOutcome::Warned {
                scope: RateScope::Personal
            },
        }
    );
    assert!(surface.replies().pop().unwrap().contains("too fast"));

    assert_eq!(
        dispatcher.dispatch(private_message("QQ:2", ".r")).await,
        DispatchOutcome::RateLimited {
            command: "r".to_string(),
            outcome: RateLimitOutcome::Penalized {
                scope: RateScope::Personal,
                score: 100,
            },
        }
    );
    assert_eq!(dispatcher.ban_list().get("QQ:2").unwrap().score, 100);
    assert_eq!(dispatcher.ban_list().rank_of("QQ:2"), Some(BanRank::Warn));

    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(dispatcher.dispatch(private_message("QQ:2", ".r")).await, solved("r"));
}

#[tokio::test(start_paused = true)]
async fn test_banned_sender_makes_bot_leave() {
    let mut config = config();
    config.ban.quit_place_immediately = true;
    let (dispatcher, surface) = dispatcher_with(
        &config,
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );
    dispatcher.ban_list().ban("QQ:66", "mallory", GROUP_ID, "test");

    assert_eq!(dispatcher.dispatch(group_message("QQ:66", ".r")).await, DispatchOutcome::Refused);
    assert!(surface.left().is_empty());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert_eq!(surface.left(), vec![ConversationId::new(GROUP_ID)]);
    assert!(surface.conversation_posts().iter().any(|p| p.contains("ban list")));
}

#[tokio::test]
async fn test_banned_sender_is_refused_silently_by_default() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );
    dispatcher.ban_list().ban("QQ:66", "mallory", GROUP_ID, "test");
    assert_eq!(dispatcher.dispatch(private_message("QQ:66", ".r")).await, DispatchOutcome::Refused);
    assert!(surface.replies().is_empty());
}

#[tokio::test]
async fn test_blocked_words_are_refused_and_escalate() {
    let mut config = config();
    config.censor.enabled = true;
    config.censor.mode = CensorMode::AllInput;
    config.censor.levels.notice.words = vec!["darn".to_string()];
    config.censor.levels.danger.words = vec!["forbidden".to_string()];
    let (dispatcher, surface) = dispatcher_with(
        &config,
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r DARN")).await, DispatchOutcome::Censored);
    assert_eq!(
        surface.replies().pop().as_deref(),
        Some("This command was not processed: it contains blocked words.")
    );

    assert_eq!(
        dispatcher.dispatch(group_message("QQ:2", ".r forbidden")).await,
        DispatchOutcome::Censored
    );
    assert_eq!(dispatcher.ban_list().rank_of("QQ:2"), Some(BanRank::Banned));
    assert!(!surface.notices().is_empty());

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r")).await, DispatchOutcome::Refused);
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_panicking_handler_only_fails_its_message() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            Capability::builder("boom")
                .auto_activate(true)
                .command("boom", |_| panic!("handler exploded"))
                .build(),
            echo_capability("dice", "r").auto_activate(true).build(),
        ],
    );

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".boom")).await, DispatchOutcome::Failed);
    assert_eq!(surface.replies().len(), 1);

    assert_eq!(dispatcher.dispatch(group_message("QQ:2", ".r")).await, solved("r"));
}

#[tokio::test]
async fn test_later_activated_capability_wins_shared_command() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            echo_capability("first", "x").build(),
            echo_capability("second", "x").build(),
        ],
    );
    dispatcher.dispatch(admin_message("QQ:2", ".ext first on").build()).await;
    dispatcher.dispatch(admin_message("QQ:2", ".ext second on").build()).await;
    dispatcher.dispatch(group_message("QQ:3", ".x")).await;
    assert_eq!(surface.replies().pop().as_deref(), Some("second:x"));

    dispatcher.dispatch(admin_message("QQ:2", ".ext first on").build()).await;
    dispatcher.dispatch(group_message("QQ:3", ".x")).await;
    assert_eq!(surface.replies().pop().as_deref(), Some("first:x"));
}

#[tokio::test]
async fn test_unsolved_handler_falls_through_to_next_capability() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            echo_capability("fallback", "x").auto_activate(true).build(),
            Capability::builder("picky")
                .auto_activate(true)
                .command("x", |ctx| {
                    if ctx.command.args.is_empty() {
                        CommandOutcome::unsolved()
                    } else {
                        CommandOutcome::reply("picky")
                    }
                })
                .build(),
        ],
    );
    dispatcher.dispatch(group_message("QQ:2", ".x")).await;
    assert_eq!(surface.replies().pop().as_deref(), Some("fallback:x"));
    dispatcher.dispatch(group_message("QQ:2", ".x 1")).await;
    assert_eq!(surface.replies().pop().as_deref(), Some("picky"));
}

#[tokio::test]
async fn test_help_is_appended_when_requested() {
    let (dispatcher, surface) = dispatcher_with(&config(), vec![]);
    dispatcher.dispatch(admin_message("QQ:2", ".bot sideways").build()).await;
    assert!(surface.replies().pop().unwrap().starts_with("bot:"));
}

#[tokio::test]
async fn test_scripted_handler_timeout_counts_as_handled() {
    let (dispatcher, surface) = dispatcher_with(
        &config(),
        vec![
            Capability::builder("slow")
                .scripted()
                .auto_activate(true)
                .command("slow", |_| {
                    std::thread::sleep(Duration::from_millis(300));
                    CommandOutcome::reply("late")
                })
                .build(),
        ],
    );
    let mut scripting = config().scripting;
    scripting.enabled = true;
    let dispatcher = dispatcher.with_bridge(HookBridge::new(&scripting).with_timeout(Duration::from_millis(50)));

    assert_eq!(dispatcher.dispatch(private_message("QQ:2", ".slow")).await, solved("slow"));
    let replies = surface.replies();
    assert_eq!(replies.len(), 1);
    assert_ne!(replies[0], "late");
}

#[tokio::test]
async fn test_scripted_capability_is_skipped_without_worker() {
    let (dispatcher, _surface) = dispatcher_with(
        &config(),
        vec![
            Capability::builder("script")
                .scripted()
                .auto_activate(true)
                .command("s", |_| CommandOutcome::reply("ran"))
                .build(),
        ],
    );
    assert_eq!(dispatcher.dispatch(private_message("QQ:2", ".s")).await, unsolved("s"));
}

#[tokio::test]
async fn test_solved_commands_are_counted() {
    let (dispatcher, _surface) = dispatcher_with(
        &config(),
        vec![echo_capability("dice", "r").auto_activate(true).build()],
    );
    dispatcher.dispatch(group_message("QQ:2", ".r")).await;
    dispatcher.dispatch(group_message("QQ:2", ".nope")).await;

    let stats = dispatcher.stats().snapshot(&Platform::new(PLATFORM)).unwrap();
    assert_eq!(stats.commands_executed, 1);

    let record = dispatcher.conversations().get(&ConversationId::new(GROUP_ID)).unwrap();
    let conversation = record.lock().await;
    assert!(conversation.members[&UserId::new("QQ:2")].last_command_at.is_some());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

/// A capability whose `hold` command blocks for `hold_ms` and records the
/// highest number of handlers seen running at once.
fn overlap_capability(hold_ms: u64) -> (Capability, Arc<AtomicUsize>) {
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&peak);
    let capability = Capability::builder("hold")
        .auto_activate(true)
        .command("hold", move |_| {
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            seen.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(hold_ms));
            running.fetch_sub(1, Ordering::SeqCst);
            CommandOutcome::reply("held")
        })
        .build();
    (capability, peak)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_messages_in_one_conversation_never_overlap() {
    let (capability, peak) = overlap_capability(30);
    let (dispatcher, surface) = dispatcher_with(&config(), vec![capability]);
    let dispatcher = Arc::new(dispatcher);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.dispatch(group_message(&format!("QQ:{}", i + 2), ".hold")).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), solved("hold"));
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(surface.replies().len(), 6);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_separate_conversations_run_in_parallel() {
    let (capability, peak) = overlap_capability(200);
    let (dispatcher, _surface) = dispatcher_with(&config(), vec![capability]);
    let dispatcher = Arc::new(dispatcher);

    let handles: Vec<_> = ["QQ:2", "QQ:3"]
        .into_iter()
        .map(|sender| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move { dispatcher.dispatch(private_message(sender, ".hold")).await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), solved("hold"));
    }

    assert_eq!(peak.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pending_registration_does_not_stall_other_conversations() {
    let (dispatcher, _surface) = dispatcher_with(
        &config(),
        vec![
            Capability::builder("slow")
                .scripted()
                .auto_activate(true)
                .command("slow", |_| {
                    std::thread::sleep(Duration::from_millis(600));
                    CommandOutcome::reply("done")
                })
                .build(),
            echo_capability("dice", "r").auto_activate(true).build(),
        ],
    );
    let mut scripting = config().scripting;
    scripting.enabled = true;
    let dispatcher = Arc::new(dispatcher.with_bridge(HookBridge::new(&scripting)));

    let slow = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.dispatch(group_message("QQ:2", ".slow")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let registering = {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move { dispatcher.register(echo_capability("late", "late").build()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = Instant::now();
    assert_eq!(dispatcher.dispatch(private_message("QQ:3", ".r")).await, solved("r"));
    assert!(started.elapsed() < Duration::from_millis(300));

    registering.await.unwrap().unwrap();
    assert!(!slow.is_finished());
    assert!(dispatcher.registry().await.find("late").is_some());
    assert_eq!(slow.await.unwrap(), solved("slow"));
}
