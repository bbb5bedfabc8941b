//! `dicebotd` - runs the dispatch core against a console adapter.
//!
//! Lines typed on stdin are dispatched as messages from a single console
//! user; replies are printed to stdout. Stops on EOF or Ctrl+C.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod builtin;
mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use dicebot_config::Config;
use dicebot_core::{ConversationId, SenderRole, UserId};
use dicebot_dispatch::{Dispatcher, run_inbound_router};
use dicebot_extensions::CapabilityRegistry;
use dicebot_telemetry::LogConfig;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::console::{CONSOLE_PLATFORM, ConsoleIdentity, ConsoleSurface};

/// Central inbound channel capacity.
const INBOUND_CAPACITY: usize = 256;

/// Ban-score decay period.
const DECAY_INTERVAL: Duration = Duration::from_secs(60);

/// Role the console user speaks with.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Role {
    /// Ordinary member.
    Member,
    /// Conversation admin.
    Admin,
    /// Conversation owner.
    Owner,
}

impl From<Role> for SenderRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Member => Self::Member,
            Role::Admin => Self::Admin,
            Role::Owner => Self::Owner,
        }
    }
}

/// Dicebot daemon: dispatch core with a console adapter.
#[derive(Parser)]
#[command(name = "dicebotd")]
#[command(author, version, about = "Dicebot daemon - dispatch core on a console adapter")]
struct Args {
    /// Load only this config file over the defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace whose `.dicebot/config.toml` joins the config chain.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Console user id.
    #[arg(long, default_value = "console:user")]
    user: String,

    /// Console user's role in the conversation.
    #[arg(long, value_enum, default_value = "owner")]
    role: Role,

    /// Talk in a private chat instead of a group.
    #[arg(long)]
    private: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return Config::load_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()));
    }
    let loaded = Config::load(args.workspace.as_deref()).context("failed to load config")?;
    Ok(loaded.config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let mut log_config = LogConfig::from_section(&config.logging)?;
    if args.verbose {
        log_config.level = "debug".to_string();
    }
    if let Err(e) = dicebot_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let mut registry = CapabilityRegistry::from_config(&config);
    for capability in builtin::all() {
        registry.register(capability)?;
    }
    let dispatcher = Arc::new(Dispatcher::new(&config, registry, Arc::new(ConsoleSurface))?);

    let identity = ConsoleIdentity {
        user: UserId::new(args.user.as_str()),
        nickname: args.user.clone(),
        role: args.role.into(),
        conversation: if args.private {
            ConversationId::new(args.user.as_str())
        } else {
            ConversationId::new(format!("{CONSOLE_PLATFORM}:group"))
        },
        private: args.private,
    };

    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let mut router = tokio::spawn(run_inbound_router(
        Arc::clone(&dispatcher),
        inbound_rx,
        shutdown_tx.subscribe(),
    ));
    let reader = tokio::spawn(console::read_stdin(identity, inbound_tx));

    let ban_list = Arc::clone(dispatcher.ban_list());
    let decay = tokio::spawn(async move {
        let mut interval = tokio::time::interval(DECAY_INTERVAL);
        // The first tick fires immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = ban_list.decay_once();
            if removed > 0 {
                info!(removed, "Ban entries decayed to zero and were dropped");
            }
        }
    });

    println!(
        "{}",
        format!(
            "dicebotd ready as {} (prefixes: {})",
            dispatcher.bot_id(),
            config.dispatch.command_prefixes.join(" ")
        )
        .cyan()
        .bold()
    );

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}", "Shutting down...".yellow());
            let _ = shutdown_tx.send(());
        },
        result = &mut router => {
            if let Err(e) = result {
                warn!(error = %e, "Router task ended abnormally");
            }
        },
    }

    reader.abort();
    decay.abort();
    if !router.is_finished() {
        let _ = router.await;
    }

    info!(
        commands = dispatcher.stats().total_commands(),
        conversations = dispatcher.conversations().len(),
        "Dispatcher stopped"
    );
    println!("{}", "Stopped".green().bold());
    Ok(())
}
