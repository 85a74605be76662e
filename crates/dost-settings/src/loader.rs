//! Settings loading: file discovery, deep merge, environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::errors::{Result, SettingsError};
use crate::types::DostSettings;

/// Default location of the user settings file: `~/.dost/settings.json`.
pub fn settings_path() -> PathBuf {
    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    home.join(".dost").join("settings.json")
}

/// Load settings from the default path.
pub fn load_settings() -> Result<DostSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from `path`, deep-merged over defaults, then env overrides.
///
/// A missing file is not an error: defaults (plus env) are returned.
pub fn load_settings_from_path(path: &Path) -> Result<DostSettings> {
    let defaults = serde_json::to_value(DostSettings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&raw)?;
        deep_merge(defaults, user)
    } else {
        tracing::debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: DostSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings)?;
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; every other value in `overlay` replaces the one
/// in `base`. `null` in the overlay leaves the base value untouched.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply `DOST_*` environment variables on top of `settings`.
pub fn apply_env_overrides(settings: &mut DostSettings) -> Result<()> {
    apply_overrides_from(settings, |var| std::env::var(var).ok())
}

pub(crate) fn apply_overrides_from(
    settings: &mut DostSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(host) = lookup("DOST_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = lookup("DOST_PORT") {
        settings.server.port = parse_var("DOST_PORT", port)?;
    }
    if let Some(level) = lookup("DOST_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(json) = lookup("DOST_LOG_JSON") {
        settings.logging.json = parse_var("DOST_LOG_JSON", json)?;
    }
    if let Some(secs) = lookup("DOST_IDLE_THRESHOLD_SECS") {
        settings.websocket.idle_threshold_secs = parse_var("DOST_IDLE_THRESHOLD_SECS", secs)?;
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SettingsError::Env { var, value })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
