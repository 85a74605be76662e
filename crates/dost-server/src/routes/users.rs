use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use dost_core::UserId;
use dost_core::records::UserRecord;
use tracing::info;

use super::ApiError;
use crate::server::AppState;
use crate::store::NewUser;

/// POST /users
pub(super) async fn create(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<UserRecord>), ApiError> {
    let user = state.store.create_user(body).await?;
    info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}
pub(super) async fn fetch(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserRecord>, ApiError> {
    Ok(Json(state.store.user(user_id).await?))
}
