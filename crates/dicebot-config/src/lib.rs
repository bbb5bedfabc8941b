#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered configuration for the dicebot runtime.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dicebot_config::Config;
//!
//! let loaded = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("prefixes: {:?}", loaded.config.dispatch.command_prefixes);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Workspace** (`{workspace}/.dicebot/config.toml`)
//! 2. **User** (`~/.dicebot/config.toml`, or `$DICEBOT_HOME/config.toml`)
//! 3. **System** (`/etc/dicebot/config.toml`)
//! 4. **Environment variables** (`DICEBOT_*`), fallback only
//! 5. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other dicebot crate; consumers read the section
//! types directly.

/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Commonly used types.
pub mod prelude;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::LoadedConfig;
pub use types::*;

impl Config {
    /// Load configuration with the full precedence chain.
    ///
    /// See [`loader::load`] for the algorithm.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if any config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&std::path::Path>) -> ConfigResult<LoadedConfig> {
        loader::load(workspace_root, None)
    }

    /// Load configuration from a single file over the embedded defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &std::path::Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serializes_with_section_names() {
        let json = serde_json::to_value(Config::default()).unwrap();
        for section in ["dispatch", "activation", "rate_limit", "ban", "censor", "scripting", "logging"] {
            assert!(json.get(section).is_some(), "missing section {section}");
        }
        assert_eq!(json["censor"]["mode"], "all_input");
    }
}
