//! Prometheus metrics recorder and `/metrics` endpoint handler.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

// Metric name constants to avoid typos across modules.

/// WebSocket connections opened total (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections total (counter).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Outbound frames accepted by a connection (counter).
pub const WS_MESSAGES_SENT_TOTAL: &str = "ws_messages_sent_total";
/// Inbound frames parsed from clients (counter, labels: type).
pub const WS_MESSAGES_RECEIVED_TOTAL: &str = "ws_messages_received_total";
/// Messages queued for offline users (counter).
pub const WS_OFFLINE_QUEUED_TOTAL: &str = "ws_offline_queued_total";
/// Queued messages evicted by the capacity cap or lost on replay (counter, labels: reason).
pub const WS_OFFLINE_DROPPED_TOTAL: &str = "ws_offline_dropped_total";
/// Connections closed by the idle sweep (counter).
pub const WS_SWEEP_REMOVED_TOTAL: &str = "ws_sweep_removed_total";
/// Chat messages handled over HTTP (counter, labels: source).
pub const HTTP_CHAT_MESSAGES_TOTAL: &str = "http_chat_messages_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_and_render() {
        // Build a recorder + handle (no global install to avoid test conflicts).
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = render(&handle);
        assert!(output.is_empty() || output.contains('#') || output.contains('\n'));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_MESSAGES_SENT_TOTAL,
            WS_MESSAGES_RECEIVED_TOTAL,
            WS_OFFLINE_QUEUED_TOTAL,
            WS_OFFLINE_DROPPED_TOTAL,
            WS_SWEEP_REMOVED_TOTAL,
            HTTP_CHAT_MESSAGES_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
