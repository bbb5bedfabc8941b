//! Post-merge configuration validation.
//!
//! Checks that deserialized [`Config`](crate::Config) values are in range
//! and that cross-field invariants hold.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound on `activation.max_chain_depth`.
const MAX_CHAIN_DEPTH_LIMIT: usize = 64;

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_dispatch(config)?;
    validate_activation(config)?;
    validate_ban(config)?;
    validate_scripting(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_dispatch(config: &Config) -> ConfigResult<()> {
    let d = &config.dispatch;
    if d.command_prefixes.is_empty() {
        return Err(invalid(
            "dispatch.command_prefixes",
            "at least one command prefix is required",
        ));
    }
    if d.command_prefixes.iter().any(String::is_empty) {
        return Err(invalid(
            "dispatch.command_prefixes",
            "command prefixes must not be empty strings",
        ));
    }
    if d.bot_id.trim().is_empty() {
        return Err(invalid("dispatch.bot_id", "bot id must not be empty"));
    }
    Ok(())
}

fn validate_activation(config: &Config) -> ConfigResult<()> {
    let depth = config.activation.max_chain_depth;
    if depth == 0 || depth > MAX_CHAIN_DEPTH_LIMIT {
        return Err(invalid(
            "activation.max_chain_depth",
            format!("must be between 1 and {MAX_CHAIN_DEPTH_LIMIT}, got {depth}"),
        ));
    }
    Ok(())
}

fn validate_ban(config: &Config) -> ConfigResult<()> {
    let b = &config.ban;
    if b.threshold_warn <= 0 {
        return Err(invalid("ban.threshold_warn", "must be positive"));
    }
    if b.threshold_ban < b.threshold_warn {
        return Err(invalid(
            "ban.threshold_ban",
            format!(
                "must not be below ban.threshold_warn ({} < {})",
                b.threshold_ban, b.threshold_warn
            ),
        ));
    }
    if b.reduce_per_minute < 0 {
        return Err(invalid("ban.reduce_per_minute", "must not be negative"));
    }
    if config.rate_limit.spam_penalty_score < 0 {
        return Err(invalid("rate_limit.spam_penalty_score", "must not be negative"));
    }
    Ok(())
}

fn validate_scripting(config: &Config) -> ConfigResult<()> {
    let s = &config.scripting;
    if s.timeout_secs == 0 {
        return Err(invalid("scripting.timeout_secs", "must be at least 1"));
    }
    if s.queue_capacity == 0 {
        return Err(invalid("scripting.queue_capacity", "must be at least 1"));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                config.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&config.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                config.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_empty_prefixes_rejected() {
        let mut config = Config::default();
        config.dispatch.command_prefixes.clear();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "dispatch.command_prefixes"));
    }

    #[test]
    fn test_chain_depth_bounds() {
        let mut config = Config::default();
        config.activation.max_chain_depth = 0;
        assert!(validate(&config).is_err());
        config.activation.max_chain_depth = 65;
        assert!(validate(&config).is_err());
        config.activation.max_chain_depth = 64;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_ban_thresholds_ordered() {
        let mut config = Config::default();
        config.ban.threshold_ban = 50;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }
}
