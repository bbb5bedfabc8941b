//! Dicebot Hooks - the bridge between the dispatch pipeline and capability code.
//!
//! Capabilities come in two flavours:
//! - **Native**: Rust closures, run inline on the task handling the message
//! - **Scripted**: run one at a time on a dedicated [`ScriptWorker`]; the
//!   caller waits on a one-shot reply with a timeout
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dicebot_config::ScriptingSection;
//! use dicebot_extensions::Capability;
//! use dicebot_hooks::{HookBridge, HookPoint};
//!
//! # async fn demo() -> Result<(), dicebot_hooks::HookError> {
//! let bridge = HookBridge::new(&ScriptingSection::default());
//! let cap = Arc::new(Capability::builder("deck").scripted().build());
//! let answer = bridge.invoke(&cap, HookPoint::Command, || 6).await?;
//! assert_eq!(answer, 6);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod bridge;
mod error;
mod panic;
mod point;
mod result;
mod worker;

pub use bridge::HookBridge;
pub use error::{HookError, HookResult};
pub use panic::{install_backtrace_capture, panic_message, take_panic_backtrace};
pub use point::HookPoint;
pub use result::{HookExecution, HookExecutionResult};
pub use worker::ScriptWorker;
