//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server is running.
    pub status: &'static str,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open WebSocket connections.
    pub connections: usize,
    /// Users with at least one open connection.
    pub active_users: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize, active_users: usize) -> HealthResponse {
    HealthResponse {
        status: "healthy",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        active_users,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_server_is_healthy() {
        let resp = health_check(Instant::now(), 0, 0);
        assert_eq!(resp.status, "healthy");
        assert!(resp.uptime_secs < 2);
    }

    #[test]
    fn uptime_increases() {
        let start = Instant::now()
            .checked_sub(std::time::Duration::from_secs(60))
            .unwrap();
        assert!(health_check(start, 0, 0).uptime_secs >= 59);
    }

    #[test]
    fn counters_serialize() {
        let parsed = serde_json::to_value(health_check(Instant::now(), 3, 2)).unwrap();
        assert_eq!(parsed["connections"], 3);
        assert_eq!(parsed["active_users"], 2);
        assert!(parsed["uptime_secs"].is_number());
    }
}
