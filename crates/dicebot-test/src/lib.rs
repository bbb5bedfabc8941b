//! Dicebot Test - Shared test utilities for the dicebot dispatch core.
//!
//! Mocks and fixtures used by the dispatch integration tests and by any
//! crate that needs a [`ReplySurface`](dicebot_core::ReplySurface) or a few
//! ready-made capabilities.
//!
//! ```rust,ignore
//! use dicebot_test::{RecordingReplySurface, group_message};
//!
//! let surface = RecordingReplySurface::new();
//! let msg = group_message("QQ:2", ".r d20");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
