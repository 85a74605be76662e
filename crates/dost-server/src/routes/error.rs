//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dost_learning::LearningError;
use serde_json::json;
use tracing::warn;

use crate::store::StoreError;
use crate::transcription::TranscriptionError;

/// Failures surfaced to HTTP clients as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Record store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Learning service rejected the input.
    #[error(transparent)]
    Learning(#[from] LearningError),

    /// Speech-to-text failure.
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    /// Malformed request that extractors let through.
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::UserNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::Invalid(_)) | Self::Learning(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Transcription(TranscriptionError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Transcription(TranscriptionError::InvalidAudio(_)) => StatusCode::BAD_REQUEST,
            Self::Transcription(TranscriptionError::NoSpeech) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dost_core::UserId;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::from(StoreError::UserNotFound(UserId(9))).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Invalid("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(LearningError::InvalidRating(7.0)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TranscriptionError::Unavailable).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(TranscriptionError::NoSpeech).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn body_carries_message() {
        let resp = ApiError::from(StoreError::UserNotFound(UserId(4))).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["error"], "user 4 not found");
    }
}
