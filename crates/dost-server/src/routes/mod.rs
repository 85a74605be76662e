//! HTTP and WebSocket routes.
//!
//! ## Submodules
//!
//! | Module | Routes |
//! |--------|--------|
//! | `system` | `/`, `/health`, `/status`, `/metrics`, `/notifications/system` |
//! | `users` | `/users`, `/users/{id}` |
//! | `chat` | `/chat/message`, `/voice/transcribe`, `/conversations`, `/context/update` |
//! | `planner` | `/tasks`, `/calendar/today`, `/calendar/events` |
//! | `learning` | `/insights`, `/learning/*` |
//! | `ws` | `/ws/{user_id}` |
//!
//! Handlers are thin: they resolve the user, call collaborators on
//! [`AppState`], and push WebSocket notifications through the manager.

mod chat;
mod error;
mod learning;
mod planner;
mod system;
mod users;
mod ws;

pub use error::ApiError;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use dost_core::UserId;
use serde::Deserialize;

use crate::server::AppState;
use crate::transcription::MAX_AUDIO_SIZE;

/// `?user_id=` query parameter shared by most routes.
#[derive(Debug, Deserialize)]
pub(crate) struct UserQuery {
    pub user_id: UserId,
}

/// Route table without state or middleware.
pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(system::banner))
        .route("/health", get(system::health))
        .route("/status", get(system::status))
        .route("/metrics", get(system::metrics))
        .route("/notifications/system", post(system::notify))
        .route("/users", post(users::create))
        .route("/users/{id}", get(users::fetch))
        .route("/chat/message", post(chat::message))
        .route(
            "/voice/transcribe",
            post(chat::voice).layer(DefaultBodyLimit::max(MAX_AUDIO_SIZE)),
        )
        .route("/conversations", get(chat::history))
        .route("/context/update", post(chat::update_context))
        .route("/tasks", get(planner::list_tasks).post(planner::create_task))
        .route("/calendar/today", get(planner::today))
        .route("/calendar/events", post(planner::create_event))
        .route("/insights", get(learning::insights))
        .route("/learning/predictions", get(learning::predictions))
        .route("/learning/feedback", post(learning::feedback))
        .route("/learning/stats", get(learning::stats))
        .route("/ws/{user_id}", get(ws::upgrade))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::{Request, Response, StatusCode};
    use dost_settings::DostSettings;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::server::{AppState, router};
    use crate::store::NewUser;

    pub fn state() -> AppState {
        AppState::in_process(&DostSettings::default(), None)
    }

    pub async fn with_user(state: &AppState) -> dost_core::UserId {
        state
            .store
            .create_user(NewUser {
                name: "Asha".into(),
                email: "asha@example.com".into(),
                preferences: serde_json::Map::new(),
            })
            .await
            .unwrap()
            .id
    }

    pub async fn call(state: &AppState, req: Request<Body>) -> Response<Body> {
        router(state.clone()).oneshot(req).await.unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub async fn json(resp: Response<Body>) -> (StatusCode, Value) {
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::String(String::from_utf8_lossy(&body).into_owned()))
        };
        (status, value)
    }
}
