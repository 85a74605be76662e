//! Chat collaborator: turns a user message plus context into a reply.
//!
//! The hosted-model integration lives outside this crate; [`KeywordAssistant`]
//! is the in-process implementation used by default and in tests.

mod keyword;

pub use keyword::{Entities, Intent, IntentAnalysis, KeywordAssistant, Mood, analyze_intent, detect_mood};

use async_trait::async_trait;
use dost_core::UserId;
use dost_core::records::{CalendarEvent, TaskPriority, TaskRecord};
use serde::Serialize;
use serde_json::{Map, Value};

/// Something the reply asks the server to do.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantAction {
    /// Create a pending task.
    CreateTask {
        /// Task title.
        title: String,
        /// First date mentioned, as written.
        due_date: Option<String>,
        /// Priority.
        priority: TaskPriority,
    },
    /// Propose a calendar event.
    CalendarEvent {
        /// Event title.
        title: String,
        /// First date mentioned, as written.
        date: Option<String>,
        /// First time mentioned, as written.
        time: Option<String>,
    },
}

/// Assistant output for one message.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AssistantReply {
    /// Reply text.
    pub message: String,
    /// Context after this exchange.
    pub context: Map<String, Value>,
    /// Requested side effects.
    pub actions: Vec<AssistantAction>,
    /// Detected intent.
    pub intent: Intent,
    /// Intent confidence (0.0–1.0).
    pub confidence: f64,
}

/// Produces replies and day summaries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Reply to `message` given the user's stored context.
    async fn respond(&self, user_id: UserId, message: &str, context: &Map<String, Value>) -> AssistantReply;

    /// One-paragraph summary of a day's events and open tasks.
    async fn day_summary(&self, events: &[CalendarEvent], tasks: &[TaskRecord]) -> String;
}
