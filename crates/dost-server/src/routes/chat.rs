//! Chat, voice, conversation history and context updates.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use chrono::{Datelike, Days, NaiveDate, Utc, Weekday};
use dost_core::records::ConversationRecord;
use dost_core::{MessageType, OutboundMessage, UserId};
use metrics::counter;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use super::{ApiError, UserQuery, planner};
use crate::assistant::{AssistantAction, AssistantReply};
use crate::metrics::HTTP_CHAT_MESSAGES_TOTAL;
use crate::server::AppState;
use crate::store::{NewConversation, NewTask};
use crate::transcription::validate_audio;

const DEFAULT_HISTORY_LIMIT: usize = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Exchange flow
// ─────────────────────────────────────────────────────────────────────────────

/// Run one user message through the assistant and record the outcome.
///
/// Persists the exchange, replaces the user's context, feeds the learning
/// service, creates tasks the reply asked for, and pushes `conversation`.
async fn converse(
    state: &AppState,
    user_id: UserId,
    message: &str,
    source: &'static str,
) -> Result<AssistantReply, ApiError> {
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }
    let user = state.store.user(user_id).await?;
    let reply = state.assistant.respond(user_id, message, &user.context).await;

    let record = state
        .store
        .add_conversation(
            user_id,
            NewConversation {
                user_message: message.to_owned(),
                ai_response: reply.message.clone(),
                context: reply.context.clone(),
                intent: Some(reply.intent.as_str().to_owned()),
            },
        )
        .await?;
    let _ = state.store.set_user_context(user_id, reply.context.clone()).await?;
    let learned = state.learning.learn_from_context(user_id, &reply.context);

    let today = Utc::now().date_naive();
    for action in &reply.actions {
        if let AssistantAction::CreateTask { title, due_date, priority } = action {
            let task = state
                .store
                .create_task(
                    user_id,
                    NewTask {
                        title: title.clone(),
                        description: None,
                        priority: *priority,
                        due_date: due_date.as_deref().and_then(|d| resolve_due_date(d, today)),
                    },
                )
                .await?;
            let _ = state
                .manager
                .send_task_notification(user_id, planner::task_payload(&task))
                .await;
        }
    }

    let _ = state.manager.send_to_user(user_id, conversation_message(&record)).await;
    counter!(HTTP_CHAT_MESSAGES_TOTAL, "source" => source).increment(1);
    info!(
        user_id = %user_id,
        source,
        intent = reply.intent.as_str(),
        actions = reply.actions.len(),
        learned,
        "chat exchange recorded"
    );
    Ok(reply)
}

fn conversation_message(record: &ConversationRecord) -> OutboundMessage {
    OutboundMessage::new(
        MessageType::Conversation,
        json!({
            "user_message": record.user_message,
            "ai_response": record.ai_response,
            "timestamp": record.timestamp,
        }),
    )
}

/// Turn a date phrase from a message into a calendar date.
///
/// Accepts relative days, weekday names (next occurrence, today included)
/// and `month/day/year` with `/` or `-`; two-digit years are 20xx.
fn resolve_due_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let lower = text.to_ascii_lowercase();
    match lower.as_str() {
        "today" => return Some(today),
        "tomorrow" => return today.succ_opt(),
        "yesterday" => return today.pred_opt(),
        _ => {}
    }
    if let Ok(weekday) = lower.parse::<Weekday>() {
        let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;
        return today.checked_add_days(Days::new(u64::from(ahead)));
    }

    let parts = lower
        .split(['/', '-'])
        .map(str::parse::<u32>)
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let [month, day, year] = parts[..] else {
        return None;
    };
    let year = if year < 100 { 2000 + year } else { year };
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(super) struct ChatBody {
    user_id: UserId,
    message: String,
}

/// POST /chat/message
pub(super) async fn message(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<Value>, ApiError> {
    let reply = converse(&state, body.user_id, &body.message, "text").await?;
    Ok(Json(json!({
        "message": reply.message,
        "context": reply.context,
        "actions": reply.actions,
    })))
}

/// POST /voice/transcribe
///
/// The body is the raw audio clip. The reply is also pushed as `ai_response`
/// so voice clients can speak it.
pub(super) async fn voice(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    audio: Bytes,
) -> Result<Json<Value>, ApiError> {
    validate_audio(&audio)?;
    let _ = state.store.user(query.user_id).await?;
    let transcription = state.transcriber.transcribe(&audio).await?;
    debug!(user_id = %query.user_id, bytes = audio.len(), "audio transcribed");

    let reply = converse(&state, query.user_id, &transcription, "voice").await?;
    let _ = state
        .manager
        .send_ai_response(query.user_id, &reply.message, reply.context.clone())
        .await;
    Ok(Json(json!({
        "transcription": transcription,
        "ai_response": reply.message,
        "context": reply.context,
        "audio_available": false,
    })))
}

#[derive(Debug, Deserialize)]
pub(super) struct HistoryQuery {
    user_id: UserId,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

/// GET /conversations
pub(super) async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ConversationRecord>>, ApiError> {
    let _ = state.store.user(query.user_id).await?;
    Ok(Json(
        state
            .store
            .conversations(query.user_id, query.limit, query.offset)
            .await?,
    ))
}

/// POST /context/update
///
/// Merges the body into the stored context key by key.
pub(super) async fn update_context(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    Json(update): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let user = state.store.user(query.user_id).await?;
    let mut context = user.context;
    context.extend(update);
    let user = state.store.set_user_context(query.user_id, context).await?;
    let learned = state.learning.learn_from_context(query.user_id, &user.context);
    debug!(user_id = %query.user_id, learned, "context updated");
    Ok(Json(json!({
        "message": "Context updated successfully",
        "context": user.context,
    })))
}
