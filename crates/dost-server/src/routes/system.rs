//! Banner, health, stats, metrics and operator notifications.

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use dost_core::UserId;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::health::{self, HealthResponse};
use crate::server::AppState;
use crate::websocket::ConnectionStats;

/// GET /
pub(super) async fn banner() -> Json<Value> {
    Json(json!({
        "message": "DOST personal assistant API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
pub(super) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.manager.stats().await;
    Json(health::health_check(
        state.start_time,
        stats.active_connections,
        stats.active_users,
    ))
}

/// GET /status
pub(super) async fn status(State(state): State<AppState>) -> Json<ConnectionStats> {
    Json(state.manager.stats().await)
}

/// GET /metrics
pub(super) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.as_ref().map(crate::metrics::render).unwrap_or_default();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Debug, Deserialize)]
pub(super) struct NotifyBody {
    message: String,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// POST /notifications/system
///
/// Targets one user when `user_id` is set, everyone otherwise.
pub(super) async fn notify(State(state): State<AppState>, Json(body): Json<NotifyBody>) -> Json<Value> {
    let delivered = state
        .manager
        .send_system_notification(&body.message, body.user_id)
        .await;
    Json(json!({ "delivered": delivered }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{call, get, json, post_json, state};

    #[tokio::test]
    async fn banner_and_health() {
        let state = state();
        let (status, body) = json(call(&state, get("/")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("DOST"));

        let (status, body) = json(call(&state, get("/health")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
    }

    #[tokio::test]
    async fn status_reports_stats() {
        let state = state();
        let (status, body) = json(call(&state, get("/status")).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["active_users"], 0);
        assert_eq!(body["total_offline_messages"], 0);
    }

    #[tokio::test]
    async fn metrics_without_recorder_is_empty() {
        let state = state();
        let resp = call(&state, get("/metrics")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn targeted_notification_to_offline_user_is_queued() {
        let state = state();
        let req = post_json("/notifications/system", &json!({"message": "maintenance", "user_id": 5}));
        let (status, body) = json(call(&state, req).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["delivered"], false);
        assert_eq!(state.manager.queued_for(dost_core::UserId(5)), 1);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let state = state();
        assert_eq!(call(&state, get("/nonexistent")).await.status(), StatusCode::NOT_FOUND);
    }
}
