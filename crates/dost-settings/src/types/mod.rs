//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`,
//! so a partial JSON file only needs the fields it changes.

mod learning;
mod server;

pub use learning::*;
pub use server::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "server": { "port": 9000 },
///   "websocket": { "idleThresholdSecs": 1800 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DostSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name, reported by `GET /`.
    pub name: String,
    /// HTTP listener.
    pub server: ServerSettings,
    /// WebSocket connection manager.
    pub websocket: WebSocketSettings,
    /// Learning system thresholds.
    pub learning: LearningSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for DostSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "DOST - AI Assistant".to_string(),
            server: ServerSettings::default(),
            websocket: WebSocketSettings::default(),
            learning: LearningSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl DostSettings {
    /// Correct out-of-range values in place, warning about each fix.
    pub fn validate(&mut self) {
        let ws = &mut self.websocket;
        if ws.offline_queue_capacity == 0 {
            tracing::warn!("offline_queue_capacity must be positive, using 1");
            ws.offline_queue_capacity = 1;
        }
        if ws.outbound_buffer == 0 {
            tracing::warn!("outbound_buffer must be positive, using 1");
            ws.outbound_buffer = 1;
        }
        if ws.sweep_interval_secs == 0 {
            tracing::warn!("sweep_interval_secs must be positive, using 1");
            ws.sweep_interval_secs = 1;
        }

        let learning = &mut self.learning;
        if !(0.0..=1.0).contains(&learning.mood_consistency) {
            let clamped = learning.mood_consistency.clamp(0.0, 1.0);
            tracing::warn!(
                "mood_consistency out of range ({}), clamped to {clamped}",
                learning.mood_consistency
            );
            learning.mood_consistency = clamped;
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
