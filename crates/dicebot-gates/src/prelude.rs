//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_gates::prelude::*;` to import all essential types.

pub use crate::{GateError, GateResult};

pub use crate::{
    BanList, BanVerdict, ContentFilter, GateAction, RateLimitOutcome, RateLimitState, RateLimiter,
    evaluate_ban,
};
