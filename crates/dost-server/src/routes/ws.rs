use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use dost_core::UserId;
use serde_json::{Map, Value};
use tracing::debug;

use super::ApiError;
use crate::server::AppState;
use crate::websocket::connection::run_connection;

/// GET /ws/{user_id}
///
/// The user id is checked before the upgrade headers so a bad id is a 400
/// whatever the request looks like. Query parameters become session metadata.
pub(super) async fn upgrade(
    State(state): State<AppState>,
    Path(raw_user): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Ok(user_id) = raw_user.parse::<UserId>() else {
        return ApiError::BadRequest(format!("invalid user id {raw_user:?}")).into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };
    let metadata: Map<String, Value> = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
    debug!(user_id = %user_id, "websocket upgrade");

    let manager = Arc::clone(&state.manager);
    ws.on_upgrade(move |socket| run_connection(socket, manager, user_id, metadata))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    use crate::routes::test_support::{call, json, state};

    fn upgrade_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn non_integer_user_is_400() {
        let state = state();
        let (status, body) = json(call(&state, upgrade_request("/ws/abc")).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid user id \"abc\"");
    }

    #[tokio::test]
    async fn plain_get_is_not_upgraded() {
        let state = state();
        let req = Request::builder().uri("/ws/1").body(Body::empty()).unwrap();
        assert!(call(&state, req).await.status().is_client_error());
    }
}
