//! User configuration loading for async-tagger.
//!
//! User config location: $XDG_CONFIG_HOME/async-tagger/async-tagger.toml
//! Fallback: the platform config directory (`dirs::config_dir`).

use std::path::{Path, PathBuf};

use super::settings::TaggerSettings;
use crate::error::{TaggerError, TaggerResult};

const LOG_TARGET: &str = "async_tagger::config";

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/async-tagger/async-tagger.toml
/// 2. Otherwise: <config dir>/async-tagger/async-tagger.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config),
        _ => dirs::config_dir()?,
    };
    Some(base.join("async-tagger").join("async-tagger.toml"))
}

/// Load settings from a TOML file.
pub fn load_settings(path: &Path) -> TaggerResult<TaggerSettings> {
    let contents = std::fs::read_to_string(path)?;
    toml::from_str(&contents)
        .map_err(|e| TaggerError::config(format!("{}: {}", path.display(), e)))
}

/// Load the user configuration, falling back to defaults when there is none.
///
/// A file that exists but fails to parse is an error.
pub fn load_user_config() -> TaggerResult<TaggerSettings> {
    let Some(path) = user_config_path() else {
        return Ok(TaggerSettings::default());
    };
    if !path.exists() {
        log::debug!(
            target: LOG_TARGET,
            "No user config at {}, using defaults",
            path.display()
        );
        return Ok(TaggerSettings::default());
    }
    log::info!(target: LOG_TARGET, "Loading user config from {}", path.display());
    load_settings(&path)
}
