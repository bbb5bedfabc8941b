//! Logging and tracing for the dicebot runtime.
//!
//! This crate provides:
//! - Logging setup with selectable formats and daily-rotated file output
//! - A per-message [`TraceContext`] for correlating pipeline logs
//!
//! # Example
//!
//! ```rust,no_run
//! use dicebot_telemetry::{LogConfig, LogFormat, TraceContext, setup_logging};
//!
//! # fn main() -> Result<(), dicebot_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Pretty)
//!     .with_directive("dicebot_gates=trace");
//! setup_logging(&config)?;
//!
//! let ctx = TraceContext::new("group:1", "user:2", "QQ");
//! let _guard = ctx.span().entered();
//! tracing::info!("dispatching");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::TraceContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{LogConfig, LogFormat, LogTarget, setup_default_logging, setup_logging};
