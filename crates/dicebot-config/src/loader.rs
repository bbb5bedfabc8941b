//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `/etc/dicebot/config.toml` (system)
//! 3. Merge `~/.dicebot/config.toml`, or `$DICEBOT_HOME/config.toml` (user)
//! 4. Merge `{workspace}/.dicebot/config.toml` (workspace)
//! 5. Apply `DICEBOT_*` env var fallbacks for fields no file set
//! 6. Deserialize merged tree → `Config`
//! 7. Validate

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Environment variables consulted as fallbacks, with the field they fill.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("DICEBOT_LOG_LEVEL", "logging.level"),
    ("DICEBOT_BOT_ID", "dispatch.bot_id"),
    ("DICEBOT_MASTERS", "dispatch.masters"),
];

/// A validated configuration plus the files it was assembled from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The final configuration.
    pub config: Config,
    /// Files that contributed a layer, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Load the configuration with layered file precedence.
///
/// `workspace_root` enables the workspace layer. `home_override` replaces
/// the user-layer directory (the path is treated as the `.dicebot`
/// directory itself).
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(workspace_root: Option<&Path>, home_override: Option<&Path>) -> ConfigResult<LoadedConfig> {
    let env_vars: HashMap<String, String> = std::env::vars()
        .filter(|(k, _)| k.starts_with("DICEBOT_"))
        .collect();
    load_with_env(workspace_root, home_override, &env_vars)
}

/// [`load`] with an explicit environment, for callers that control it.
///
/// # Errors
///
/// See [`load`].
pub fn load_with_env(
    workspace_root: Option<&Path>,
    home_override: Option<&Path>,
    env_vars: &HashMap<String, String>,
) -> ConfigResult<LoadedConfig> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut set_by_files = HashSet::new();
    let mut loaded_files = Vec::new();

    let user_dir = match home_override {
        Some(dir) => dir.to_path_buf(),
        None => match env_vars.get("DICEBOT_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => home_directory()?.join(".dicebot"),
        },
    };

    let mut layers = vec![
        ("system", PathBuf::from("/etc/dicebot/config.toml")),
        ("user", user_dir.join("config.toml")),
    ];
    if let Some(ws_root) = workspace_root {
        layers.push(("workspace", ws_root.join(".dicebot").join("config.toml")));
    }

    for (layer, path) in layers {
        if let Some(overlay) = try_load_file(&path)? {
            deep_merge(&mut merged, &overlay, "", &mut set_by_files);
            loaded_files.push(path.display().to_string());
            info!(layer, path = %path.display(), "loaded config layer");
        }
    }

    let applied = apply_env_fallbacks(&mut merged, &set_by_files, env_vars);
    if applied > 0 {
        debug!(count = applied, "applied environment variable fallbacks");
    }

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&config)?;

    Ok(LoadedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a single file on top of the embedded defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is missing, unreadable, malformed or
/// invalid.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    deep_merge(&mut merged, &overlay, "", &mut HashSet::new());

    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: path.display().to_string(),
                source: e,
            })?;

    validate::validate(&config)?;
    Ok(config)
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };

    let size = content.len() as u64;
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.display().to_string(),
            size,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(Some(value))
}

/// Recursively merge `overlay` into `base`, recording every leaf path the
/// overlay sets. Tables merge per key; scalars and arrays replace.
fn deep_merge(
    base: &mut toml::Value,
    overlay: &toml::Value,
    prefix: &str,
    set_paths: &mut HashSet<String>,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val, &path, set_paths);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                    set_paths.insert(path);
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            set_paths.insert(prefix.to_owned());
        },
    }
}

/// Fill fields from `DICEBOT_*` variables when no file layer set them.
fn apply_env_fallbacks(
    merged: &mut toml::Value,
    set_by_files: &HashSet<String>,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied = 0_usize;
    for (var, field) in ENV_FALLBACKS {
        if set_by_files.contains(*field) {
            continue;
        }
        let Some(raw) = env_vars.get(*var) else {
            continue;
        };
        let value = if *field == "dispatch.masters" {
            toml::Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| toml::Value::String(s.to_owned()))
                    .collect(),
            )
        } else {
            toml::Value::String(raw.clone())
        };
        if set_path(merged, field, value) {
            applied = applied.saturating_add(1);
        }
    }
    applied
}

/// Set a dotted `path` inside a table tree, creating intermediate tables.
fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) -> bool {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return false;
    };
    let mut cursor = root;
    for part in parts {
        let Some(table) = cursor.as_table_mut() else {
            return false;
        };
        cursor = table
            .entry(part)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
    match cursor.as_table_mut() {
        Some(table) => {
            table.insert(leaf.to_owned(), value);
            true
        },
        None => false,
    }
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.dispatch.command_prefixes, vec![".", "。", "/"]);
        assert_eq!(config.activation.max_chain_depth, 10);
        assert_eq!(config.rate_limit.personal_burst, 3);
        assert_eq!(config.ban.threshold_ban, 200);
        assert!(!config.dispatch.auto_on_for("QQ-CH"));
        assert!(config.dispatch.auto_on_for("QQ"));
    }

    #[test]
    fn test_layers_merge_in_order() {
        let home = tempfile::tempdir().unwrap();
        let ws = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[rate_limit]\nenabled = true\npersonal_burst = 5\n",
        )
        .unwrap();
        std::fs::create_dir_all(ws.path().join(".dicebot")).unwrap();
        std::fs::write(
            ws.path().join(".dicebot").join("config.toml"),
            "[rate_limit]\npersonal_burst = 7\n",
        )
        .unwrap();

        let loaded =
            load_with_env(Some(ws.path()), Some(home.path()), &HashMap::new()).unwrap();
        assert!(loaded.config.rate_limit.enabled);
        assert_eq!(loaded.config.rate_limit.personal_burst, 7);
        assert_eq!(loaded.config.rate_limit.conversation_burst, 3);
        assert_eq!(loaded.loaded_files.len(), 2);
    }

    #[test]
    fn test_env_fallback_only_fills_unset_fields() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[logging]\nlevel = \"warn\"\n",
        )
        .unwrap();
        let env = HashMap::from([
            ("DICEBOT_LOG_LEVEL".to_owned(), "debug".to_owned()),
            ("DICEBOT_MASTERS".to_owned(), "QQ:1, QQ:2".to_owned()),
        ]);

        let loaded = load_with_env(None, Some(home.path()), &env).unwrap();
        assert_eq!(loaded.config.logging.level, "warn");
        assert_eq!(loaded.config.dispatch.masters, vec!["QQ:1", "QQ:2"]);
    }

    #[test]
    fn test_invalid_layer_is_reported() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join("config.toml"), "[ban\n").unwrap();
        let result = load_with_env(None, Some(home.path()), &HashMap::new());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(matches!(result, Err(ConfigError::TooLarge { .. })));
    }

    #[test]
    fn test_extension_overrides_parse() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("config.toml");
        std::fs::write(
            &file_path,
            "[extensions.coc7]\nauto_activate = false\ndisabled_commands = [\"sc\"]\n",
        )
        .unwrap();

        let config = load_file(&file_path).unwrap();
        let coc7 = config.extensions.get("coc7").unwrap();
        assert_eq!(coc7.auto_activate, Some(false));
        assert_eq!(coc7.disabled_commands, vec!["sc"]);
    }
}
