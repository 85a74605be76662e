//! Settings errors.

use std::path::PathBuf;

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Failures while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file (or the merged result) is not valid settings JSON.
    #[error("invalid settings json: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}
