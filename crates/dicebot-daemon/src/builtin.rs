//! Native capabilities bundled with the daemon.

use dicebot_extensions::{Capability, CommandContext, CommandEntry, CommandOutcome};
use rand::Rng;

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;
const DEFAULT_SIDES: u32 = 100;

/// Every bundled capability.
pub(crate) fn all() -> Vec<Capability> {
    vec![dice(), echo()]
}

/// `.r [NdM]`: roll dice. On by default.
fn dice() -> Capability {
    Capability::builder("dice")
        .alias("roll")
        .author("dicebot")
        .description("Plain dice rolls: .r, .r d20, .r 3d6")
        .auto_activate(true)
        .command_entry(
            CommandEntry::new("r", roll).with_help(".r [NdM] // roll N dice with M sides (default 1d100)"),
        )
        .build()
}

/// `.echo text`: repeat the text. Off until `.ext echo on`.
fn echo() -> Capability {
    Capability::builder("echo")
        .author("dicebot")
        .description("Repeats what it is told")
        .command("echo", |ctx| {
            if ctx.command.raw_args.is_empty() {
                CommandOutcome::help()
            } else {
                CommandOutcome::reply(ctx.command.raw_args.clone())
            }
        })
        .build()
}

fn roll(ctx: &CommandContext) -> CommandOutcome {
    let expr = ctx.command.arg(1).unwrap_or("d100");
    let Some((count, sides)) = parse_dice(expr) else {
        return CommandOutcome::help();
    };
    let mut rng = rand::thread_rng();
    let rolls: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();
    let total = rolls.iter().fold(0u32, |acc, r| acc.saturating_add(*r));
    let nickname = &ctx.event.message.sender.nickname;
    let text = if rolls.len() == 1 {
        format!("{nickname} rolled {count}d{sides} = {total}")
    } else {
        let parts: Vec<String> = rolls.iter().map(ToString::to_string).collect();
        format!("{nickname} rolled {count}d{sides} = {} = {total}", parts.join("+"))
    };
    CommandOutcome::reply(text)
}

/// `NdM`, `dM` or `N` (shorthand for `1dN`).
fn parse_dice(expr: &str) -> Option<(u32, u32)> {
    let expr = expr.to_ascii_lowercase();
    let (count, sides) = match expr.split_once('d') {
        Some(("", sides)) => (1, sides.parse().ok()?),
        Some((count, "")) => (count.parse().ok()?, DEFAULT_SIDES),
        Some((count, sides)) => (count.parse().ok()?, sides.parse().ok()?),
        None => (1, expr.parse().ok()?),
    };
    ((1..=MAX_DICE).contains(&count) && (1..=MAX_SIDES).contains(&sides)).then_some((count, sides))
}
