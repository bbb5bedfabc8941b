//! Parsed command shape shared between the parser and command handlers.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A `--name[=value]` keyword argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kwarg {
    /// Keyword name without the leading dashes.
    pub name: String,
    /// Value after `=`, if any.
    pub value: Option<String>,
}

impl Kwarg {
    /// Interpret the keyword as a flag: present without value, or any value
    /// other than `false`.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        self.value.as_deref() != Some("false")
    }
}

/// A message recognized as a command attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCommand {
    /// The command token (canonical candidate name when one matched).
    pub command: String,
    /// Everything after the command token on the first line.
    pub raw_args: String,
    /// Positional arguments.
    pub args: Vec<String>,
    /// Keyword arguments.
    pub kwargs: Vec<Kwarg>,
    /// Positional arguments joined by single spaces.
    pub clean_args: String,
    /// Users mentioned in the message.
    pub mentions: Vec<UserId>,
}

impl ParsedCommand {
    /// Positional argument `n`, 1-based.
    #[must_use]
    pub fn arg(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.args.get(i))
            .map(String::as_str)
    }

    /// Whether argument `n` (1-based) equals any of `options`, case-insensitively.
    #[must_use]
    pub fn arg_is(&self, n: usize, options: &[&str]) -> bool {
        self.arg(n)
            .is_some_and(|a| options.iter().any(|o| a.eq_ignore_ascii_case(o)))
    }

    /// Look up a keyword argument by name.
    #[must_use]
    pub fn kwarg(&self, name: &str) -> Option<&Kwarg> {
        self.kwargs.iter().find(|k| k.name == name)
    }
}
