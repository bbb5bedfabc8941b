//! Dicebot Gates - admission policies applied by the dispatch pipeline.
//!
//! - [`BanList`] and [`evaluate_ban`]: per-user and per-conversation standing
//! - [`RateLimiter`]: token buckets per sender and per conversation
//! - [`ContentFilter`]: leveled word lists with per-user hit counters
//!
//! Gates never fail a message. They return verdicts carrying
//! [`GateAction`]s, and the pipeline carries those out.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod action;
pub mod ban;
pub mod censor;
pub mod error;
pub mod rate_limit;

pub use action::GateAction;
pub use ban::{BanEntry, BanList, BanRecord, BanVerdict, evaluate_ban};
pub use censor::{CensorLevel, CensorVerdict, ContentFilter};
pub use error::{GateError, GateResult};
pub use rate_limit::{
    BucketShape, RateLimitOutcome, RateLimitState, RateLimiter, RateScope, TokenBucket,
};
