//! Command recognition.
//!
//! A message is a command attempt when, after trimming, it starts with one
//! of the configured prefixes. The text after the prefix is matched against
//! the candidate command names (longest first, case-insensitive) so that
//! `.ra50` reads as command `ra` with argument `50`.

use dicebot_config::DispatchSection;
use dicebot_core::{Kwarg, ParsedCommand, UserId};

/// Prefixes used when none are configured.
pub const DEFAULT_PREFIXES: [&str; 3] = [".", "。", "/"];

/// Parses command attempts out of message text.
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefixes: Vec<String>,
}

impl CommandParser {
    /// Build a parser for `prefixes`, falling back to [`DEFAULT_PREFIXES`]
    /// when the list is empty.
    #[must_use]
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut prefixes: Vec<String> = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        if prefixes.is_empty() {
            prefixes = DEFAULT_PREFIXES.iter().map(ToString::to_string).collect();
        }
        Self { prefixes }
    }

    /// Build from the `[dispatch]` section.
    #[must_use]
    pub fn from_section(section: &DispatchSection) -> Self {
        Self::new(section.command_prefixes.iter().cloned())
    }

    /// Configured prefixes.
    #[must_use]
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether `text` starts with a command prefix.
    #[must_use]
    pub fn has_prefix(&self, text: &str) -> bool {
        self.strip_prefix(text).is_some()
    }

    fn strip_prefix<'a>(&self, text: &'a str) -> Option<&'a str> {
        let text = text.trim();
        self.prefixes
            .iter()
            .find_map(|p| text.strip_prefix(p.as_str()))
    }

    /// Parse `text` as a command.
    ///
    /// `candidates` must be sorted longest first. Returns `None` when there
    /// is no prefix or nothing follows it.
    #[must_use]
    pub fn parse(&self, text: &str, candidates: &[String], mentions: &[UserId]) -> Option<ParsedCommand> {
        let rest = self.strip_prefix(text)?;

        let (command, raw_args) = match candidates.iter().find(|c| starts_with_ignore_case(rest, c)) {
            Some(matched) => {
                let tail = rest.get(matched.len()..).unwrap_or_default();
                (matched.to_lowercase(), first_line(tail.trim_start()))
            },
            None => {
                let rest = rest.trim_start();
                let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
                let (word, tail) = rest.split_at(end);
                if word.is_empty() {
                    return None;
                }
                (word.to_lowercase(), first_line(tail.trim_start()))
            },
        };

        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        for token in raw_args.split_whitespace() {
            match parse_kwarg(token) {
                Some(kwarg) => kwargs.push(kwarg),
                None => args.push(token.to_string()),
            }
        }

        Some(ParsedCommand {
            command,
            raw_args: raw_args.to_string(),
            clean_args: args.join(" "),
            args,
            kwargs,
            mentions: mentions.to_vec(),
        })
    }
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIXES)
    }
}

fn starts_with_ignore_case(text: &str, candidate: &str) -> bool {
    !candidate.is_empty()
        && text
            .get(..candidate.len())
            .is_some_and(|head| head.to_lowercase() == candidate.to_lowercase())
}

fn first_line(text: &str) -> &str {
    text.split('\n').next().unwrap_or_default().trim_end()
}

/// `--name` or `--name=value`.
fn parse_kwarg(token: &str) -> Option<Kwarg> {
    let body = token.strip_prefix("--")?;
    let (name, value) = match body.split_once('=') {
        Some((_, "")) => return None,
        Some((name, value)) => (name, Some(value.to_string())),
        None => (body, None),
    };
    if name.is_empty() {
        return None;
    }
    Some(Kwarg {
        name: name.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(names: &[&str]) -> Vec<String> {
        let mut list: Vec<String> = names.iter().map(ToString::to_string).collect();
        list.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        list
    }

    #[test]
    fn test_no_prefix_is_not_a_command() {
        let parser = CommandParser::default();
        assert!(!parser.has_prefix("hello"));
        assert!(parser.parse("hello", &[], &[]).is_none());
        assert!(parser.parse(".", &[], &[]).is_none());
    }

    #[test]
    fn test_longest_candidate_wins_and_splits_glued_args() {
        let parser = CommandParser::default();
        let list = candidates(&["r", "ra", "rav"]);
        let cmd = parser.parse(".RA50 hide", &list, &[]).unwrap();
        assert_eq!(cmd.command, "ra");
        assert_eq!(cmd.args, vec!["50", "hide"]);
        assert_eq!(cmd.raw_args, "50 hide");
    }

    #[test]
    fn test_unknown_command_takes_first_token() {
        let parser = CommandParser::default();
        let cmd = parser.parse("  /Foo bar  baz\nsecond line", &[], &[]).unwrap();
        assert_eq!(cmd.command, "foo");
        assert_eq!(cmd.raw_args, "bar  baz");
        assert_eq!(cmd.clean_args, "bar baz");
    }

    #[test]
    fn test_full_width_prefix() {
        let parser = CommandParser::default();
        let cmd = parser.parse("。ext list", &candidates(&["ext"]), &[]).unwrap();
        assert_eq!(cmd.command, "ext");
        assert!(cmd.arg_is(1, &["list"]));
    }

    #[test]
    fn test_kwargs_are_separated() {
        let parser = CommandParser::default();
        let cmd = parser
            .parse(".r d20 --hidden --times=3 --bad= x", &candidates(&["r"]), &[])
            .unwrap();
        assert_eq!(cmd.args, vec!["d20", "--bad=", "x"]);
        assert!(cmd.kwarg("hidden").unwrap().as_bool());
        assert_eq!(cmd.kwarg("times").unwrap().value.as_deref(), Some("3"));
    }

    #[test]
    fn test_custom_prefixes_and_mentions() {
        let parser = CommandParser::new(["!"]);
        assert!(!parser.has_prefix(".r"));
        let mention = UserId::new("QQ:3");
        let cmd = parser.parse("!r", &candidates(&["r"]), &[mention.clone()]).unwrap();
        assert_eq!(cmd.mentions, vec![mention]);
    }

    #[test]
    fn test_empty_prefix_list_uses_defaults() {
        let parser = CommandParser::new(Vec::<String>::new());
        assert_eq!(parser.prefixes().len(), DEFAULT_PREFIXES.len());
    }
}
