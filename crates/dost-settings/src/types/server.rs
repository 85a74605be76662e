use std::time::Duration;

use serde::{Deserialize, Serialize};

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// WebSocket connection manager settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSocketSettings {
    /// Maximum queued messages per offline user; oldest are evicted first.
    pub offline_queue_capacity: usize,
    /// Connection age after which the sweep closes it.
    pub idle_threshold_secs: u64,
    /// How often the background sweep runs.
    pub sweep_interval_secs: u64,
    /// Per-connection outbound channel capacity. Never below
    /// `offline_queue_capacity + 1`, so a full replay fits.
    pub outbound_buffer: usize,
}

impl WebSocketSettings {
    /// [`idle_threshold_secs`](Self::idle_threshold_secs) as a `Duration`.
    pub fn idle_threshold(&self) -> Duration {
        Duration::from_secs(self.idle_threshold_secs)
    }

    /// [`sweep_interval_secs`](Self::sweep_interval_secs) as a `Duration`.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            offline_queue_capacity: 100,
            idle_threshold_secs: 3600,
            sweep_interval_secs: 300,
            outbound_buffer: 64,
        }
    }
}
