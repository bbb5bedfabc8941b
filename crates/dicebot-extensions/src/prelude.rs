//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_extensions::prelude::*;` to import all essential types.

pub use crate::{ExtensionError, ExtensionResult};

pub use crate::{
    Capability, CapabilityStorage, CommandContext, CommandEntry, CommandFlags, CommandOutcome,
    MessageContext,
};

pub use crate::{CapabilityRegistry, collect_chained};

pub use crate::{
    ActivateReason, ActivationReport, ActivationSnapshot, ActivationState, DeactivateReason,
};
