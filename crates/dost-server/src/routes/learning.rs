use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;
use dost_learning::{Feedback, LearningStatistics, Prediction};
use serde_json::{Value, json};

use super::{ApiError, UserQuery};
use crate::server::AppState;

/// Conversations considered when building insights.
const INSIGHT_CONVERSATION_WINDOW: usize = 1_000;

/// GET /insights
pub(super) async fn insights(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    let tasks = state.store.tasks(query.user_id).await?;
    let conversations = state
        .store
        .conversations(query.user_id, INSIGHT_CONVERSATION_WINDOW, 0)
        .await?;
    let insights = state
        .learning
        .generate_insights(query.user_id, &tasks, &conversations);
    Ok(Json(json!({
        "insights": insights,
        "generated_at": Utc::now(),
    })))
}

/// GET /learning/predictions
pub(super) async fn predictions(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<Prediction>>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    Ok(Json(state.learning.predict_needs(query.user_id)))
}

/// POST /learning/feedback
pub(super) async fn feedback(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(body): Json<Feedback>,
) -> Result<Json<Value>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    state.learning.learn_from_feedback(query.user_id, body)?;
    Ok(Json(json!({ "message": "Feedback recorded" })))
}

/// GET /learning/stats
pub(super) async fn stats(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<LearningStatistics>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    Ok(Json(state.learning.statistics(query.user_id)))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{call, get, json, post_json, state, with_user};

    #[tokio::test]
    async fn insights_reflect_learned_intents() {
        let state = state();
        let user = with_user(&state).await;
        for _ in 0..3 {
            let req = post_json("/chat/message", &json!({"user_id": user.get(), "message": "what's next"}));
            assert_eq!(call(&state, req).await.status(), StatusCode::OK);
        }

        let (status, body) = json(call(&state, get(&format!("/insights?user_id={user}"))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["generated_at"].is_string());
        let insights = body["insights"].as_array().unwrap();
        assert!(
            insights
                .iter()
                .any(|i| i["description"] == "You primarily use me for question"),
            "{insights:?}"
        );
    }

    #[tokio::test]
    async fn predictions_and_feedback_round() {
        let state = state();
        let user = with_user(&state).await;
        let req = post_json(&format!("/context/update?user_id={user}"), &json!({"last_intent": "calendar"}));
        assert_eq!(call(&state, req).await.status(), StatusCode::OK);

        let (status, predictions) =
            json(call(&state, get(&format!("/learning/predictions?user_id={user}"))).await).await;
        assert_eq!(status, StatusCode::OK);
        let id = predictions[0]["id"].as_str().unwrap().to_owned();

        let req = post_json(
            &format!("/learning/feedback?user_id={user}"),
            &json!({"type": "prediction", "rating": 4.0, "prediction_id": id}),
        );
        assert_eq!(call(&state, req).await.status(), StatusCode::OK);

        let (status, stats) = json(call(&state, get(&format!("/learning/stats?user_id={user}"))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert!(stats["total_learning_points"].as_u64().unwrap() >= 2);
        assert!(stats["average_accuracy"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn out_of_range_rating_is_400() {
        let state = state();
        let user = with_user(&state).await;
        let req = post_json(&format!("/learning/feedback?user_id={user}"), &json!({"rating": 9.0}));
        let (status, body) = json(call(&state, req).await).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "rating must be between 0 and 5, got 9");
    }
}
