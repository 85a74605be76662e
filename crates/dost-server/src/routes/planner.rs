//! Tasks and calendar.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use dost_core::records::{CalendarEvent, TaskRecord, TaskStatus};
use dost_core::{MessageType, OutboundMessage};
use serde_json::{Map, Value, json};
use tracing::info;

use super::{ApiError, UserQuery};
use crate::server::AppState;
use crate::store::{NewEvent, NewTask};

/// Fields pushed to clients when a task appears.
pub(super) fn task_payload(task: &TaskRecord) -> Map<String, Value> {
    let mut data = Map::new();
    let _ = data.insert("id".into(), json!(task.id));
    let _ = data.insert("title".into(), json!(task.title));
    let _ = data.insert("due_date".into(), json!(task.due_date));
    let _ = data.insert("priority".into(), json!(task.priority));
    data
}

/// POST /tasks
pub(super) async fn create_task(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<TaskRecord>), ApiError> {
    let task = state.store.create_task(query.user_id, body).await?;
    let message = OutboundMessage::new(
        MessageType::TaskCreated,
        json!({ "id": task.id, "title": task.title, "due_date": task.due_date }),
    );
    let delivered = state.manager.send_to_user(query.user_id, message).await;
    info!(user_id = %query.user_id, task_id = task.id, delivered, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks
pub(super) async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Vec<TaskRecord>>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    Ok(Json(state.store.tasks(query.user_id).await?))
}

/// POST /calendar/events
///
/// Events starting today also go out as a `calendar_reminder`.
pub(super) async fn create_event(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(body): Json<NewEvent>,
) -> Result<(StatusCode, Json<CalendarEvent>), ApiError> {
    let event = state.store.add_event(query.user_id, body).await?;
    if event.start.date_naive() == Utc::now().date_naive() {
        let mut data = Map::new();
        let _ = data.insert("id".into(), json!(event.id));
        let _ = data.insert("title".into(), json!(event.title));
        let _ = data.insert("start".into(), json!(event.start));
        let _ = data.insert("location".into(), json!(event.location));
        let _ = state.manager.send_calendar_reminder(query.user_id, data).await;
    }
    Ok((StatusCode::CREATED, Json(event)))
}

/// GET /calendar/today
pub(super) async fn today(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    let today = Utc::now().date_naive();
    let events = state.store.events_on(query.user_id, today).await?;
    let due: Vec<TaskRecord> = state
        .store
        .tasks(query.user_id)
        .await?
        .into_iter()
        .filter(|t| t.due_date == Some(today) && t.status != TaskStatus::Completed)
        .collect();
    let summary = state.assistant.day_summary(&events, &due).await;

    let tasks: Vec<Value> = due
        .iter()
        .map(|t| json!({ "id": t.id, "title": t.title, "priority": t.priority }))
        .collect();
    Ok(Json(json!({
        "date": today,
        "events": events,
        "tasks": tasks,
        "summary": summary,
    })))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::routes::test_support::{call, get, json, post_json, state, with_user};

    #[tokio::test]
    async fn create_task_pushes_task_created() {
        let state = state();
        let user = with_user(&state).await;
        let req = post_json(
            &format!("/tasks?user_id={user}"),
            &json!({"title": "renew passport", "priority": "high", "due_date": "2026-05-01"}),
        );
        let (status, body) = json(call(&state, req).await).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["priority"], "high");
        assert_eq!(state.manager.queued_for(user), 1);

        let (status, list) = json(call(&state, get(&format!("/tasks?user_id={user}"))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list[0]["title"], "renew passport");
    }

    #[tokio::test]
    async fn task_for_unknown_user_is_404() {
        let state = state();
        let req = post_json("/tasks?user_id=9", &json!({"title": "x"}));
        assert_eq!(call(&state, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_user_id_is_rejected() {
        let state = state();
        assert_eq!(call(&state, get("/tasks")).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn today_lists_events_and_due_tasks() {
        let state = state();
        let user = with_user(&state).await;
        let today = Utc::now().date_naive();
        let start = Utc::now();

        let req = post_json(
            &format!("/calendar/events?user_id={user}"),
            &json!({"title": "Dentist", "start": start, "end": start + Duration::hours(1)}),
        );
        assert_eq!(call(&state, req).await.status(), StatusCode::CREATED);
        // Reminder queued for the offline user.
        assert_eq!(state.manager.queued_for(user), 1);

        for (title, due) in [("due today", Some(today)), ("someday", None)] {
            let req = post_json(&format!("/tasks?user_id={user}"), &json!({"title": title, "due_date": due}));
            assert_eq!(call(&state, req).await.status(), StatusCode::CREATED);
        }

        let (status, body) = json(call(&state, get(&format!("/calendar/today?user_id={user}"))).await).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events"].as_array().unwrap().len(), 1);
        assert_eq!(body["tasks"], json!([{"id": 2, "title": "due today", "priority": "medium"}]));
        let summary = body["summary"].as_str().unwrap();
        assert!(summary.contains("1 event and 1 task"), "{summary}");
    }
}
