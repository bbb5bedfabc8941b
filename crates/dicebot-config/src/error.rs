//! Configuration error types.

use std::io;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read config file {path}: {source}")]
    ReadError {
        /// Offending file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A layer is not valid TOML, or the merged tree does not fit [`Config`](crate::Config).
    #[error("cannot parse config {path}: {source}")]
    ParseError {
        /// Offending file, or a `<...>` marker for in-memory layers.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// A config file is larger than the loader accepts.
    #[error("config file {path} is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Offending file.
        path: String,
        /// Actual size in bytes.
        size: u64,
        /// Accepted maximum in bytes.
        limit: u64,
    },

    /// A value is outside its accepted range.
    #[error("invalid value for '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// No home directory to look for the user layer in.
    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
