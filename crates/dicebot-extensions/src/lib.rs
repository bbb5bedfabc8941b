//! Dicebot Extensions - capability registry and activation state.
//!
//! A *capability* (extension) bundles commands and passive hooks. The
//! [`CapabilityRegistry`] holds every capability known to the process and the
//! companion (ActiveWith) graph between them; each conversation owns an
//! [`ActivationState`] describing which capabilities it has switched on and
//! in what priority order.
//!
//! # Example
//!
//! ```
//! use dicebot_extensions::prelude::*;
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register(Capability::builder("coc7").alias("coc").build())?;
//! registry.register(Capability::builder("coc7-extras").companion_of("coc7").build())?;
//!
//! let mut state = ActivationState::new();
//! let report = state.activate_requested(&registry, &["coc"]);
//! assert_eq!(report.activated, vec!["coc7"]);
//! assert_eq!(report.companions, vec!["coc7-extras"]);
//! # Ok::<(), ExtensionError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod activation;
mod capability;
mod error;
mod registry;

pub use activation::{
    ActivateReason, ActivationReport, ActivationSnapshot, ActivationState, DeactivateReason,
};
pub use capability::{
    Capability, CapabilityBuilder, CapabilityStorage, CommandContext, CommandEntry, CommandFlags,
    CommandHandler, CommandNotifier, CommandOutcome, CommandOverride, MessageContext, MessageHook,
};
pub use error::{ExtensionError, ExtensionResult};
pub use registry::{ActiveWithGraph, CapabilityRegistry, DEFAULT_CHAIN_DEPTH, collect_chained};
