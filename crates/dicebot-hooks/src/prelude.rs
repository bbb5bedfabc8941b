//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_hooks::prelude::*;` to import all essential types.

pub use crate::{HookError, HookResult};

pub use crate::{HookBridge, HookExecution, HookExecutionResult, HookPoint};
