//! Persisted records exchanged with the store collaborator.
//!
//! Field names stay `snake_case` on the wire; the mobile client already
//! consumes these shapes from the HTTP API.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::UserId;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Task workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Being worked on.
    InProgress,
    /// Done.
    Completed,
    /// Abandoned.
    Cancelled,
}

impl TaskStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low.
    Low,
    /// Default.
    #[default]
    Medium,
    /// High.
    High,
    /// Urgent.
    Urgent,
}

impl TaskPriority {
    /// Wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A registered user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User id.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Free-form preferences.
    #[serde(default)]
    pub preferences: Map<String, Value>,
    /// Rolling conversation context (mood, last intent, counters).
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// One user message and the assistant's reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Record id.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// What the user said.
    pub user_message: String,
    /// What the assistant answered.
    pub ai_response: String,
    /// Context snapshot after the exchange.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Detected intent, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// When the exchange happened.
    pub timestamp: DateTime<Utc>,
}

/// A user task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Record id.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Priority.
    #[serde(default)]
    pub priority: TaskPriority,
    /// Due date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Completion time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// A locally stored calendar event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Record id.
    pub id: i64,
    /// Owner.
    pub user_id: UserId,
    /// Event title.
    pub title: String,
    /// Event description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Start time.
    pub start: DateTime<Utc>,
    /// End time.
    pub end: DateTime<Utc>,
    /// Location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_wire_names() {
        assert_eq!(serde_json::to_value(TaskStatus::InProgress).unwrap(), "in_progress");
        assert_eq!(TaskStatus::default(), TaskStatus::Pending);
    }

    #[test]
    fn task_priority_defaults_to_medium() {
        let task: TaskRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "user_id": 3,
            "title": "file taxes",
            "created_at": "2026-04-01T09:00:00Z"
        }))
        .unwrap();
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.due_date.is_none());
    }

    #[test]
    fn optional_fields_are_omitted() {
        let v = serde_json::to_value(CalendarEvent {
            id: 1,
            user_id: UserId(1),
            title: "standup".into(),
            description: None,
            start: Utc::now(),
            end: Utc::now(),
            location: None,
        })
        .unwrap();
        assert!(v.get("location").is_none());
        assert!(v.get("description").is_none());
    }
}
