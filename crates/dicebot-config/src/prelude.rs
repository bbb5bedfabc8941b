//! Prelude module - commonly used types for convenient import.
//!
//! Use `use dicebot_config::prelude::*;` to import all essential types.

// Loading
pub use crate::{Config, ConfigError, ConfigResult, LoadedConfig};

// Sections
pub use crate::{
    ActivationSection, BanSection, CensorAction, CensorLevelSection, CensorLevels, CensorMode,
    CensorSection, DispatchSection, ExtensionSection, LoggingSection, RateLimitSection,
    ScriptingSection,
};
