//! Record persistence collaborator and its in-memory implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dost_core::UserId;
use dost_core::records::{
    CalendarEvent, ConversationRecord, TaskPriority, TaskRecord, TaskStatus, UserRecord,
};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No user with this id.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// Input rejected before storing.
    #[error("invalid record: {0}")]
    Invalid(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Fields for a new user.
#[derive(Clone, Debug, Deserialize)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Free-form preferences.
    #[serde(default)]
    pub preferences: Map<String, Value>,
}

/// Fields for a new task.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct NewTask {
    /// Short title.
    pub title: String,
    /// Longer description.
    #[serde(default)]
    pub description: Option<String>,
    /// Priority (defaults to medium).
    #[serde(default)]
    pub priority: TaskPriority,
    /// Due date.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Fields for a new conversation exchange.
#[derive(Clone, Debug)]
pub struct NewConversation {
    /// What the user said.
    pub user_message: String,
    /// What the assistant answered.
    pub ai_response: String,
    /// Context after the exchange.
    pub context: Map<String, Value>,
    /// Detected intent.
    pub intent: Option<String>,
}

/// Fields for a new calendar event.
#[derive(Clone, Debug, Deserialize)]
pub struct NewEvent {
    /// Event title.
    pub title: String,
    /// Event description.
    #[serde(default)]
    pub description: Option<String>,
    /// Start time.
    pub start: DateTime<Utc>,
    /// End time.
    pub end: DateTime<Utc>,
    /// Location.
    #[serde(default)]
    pub location: Option<String>,
}

/// Users, conversations, tasks and calendar events keyed by user id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a user with an empty context.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Look a user up.
    async fn user(&self, user_id: UserId) -> Result<UserRecord>;

    /// Replace a user's context.
    async fn set_user_context(&self, user_id: UserId, context: Map<String, Value>) -> Result<UserRecord>;

    /// Store a conversation exchange.
    async fn add_conversation(&self, user_id: UserId, conversation: NewConversation) -> Result<ConversationRecord>;

    /// A user's conversations, newest first.
    async fn conversations(&self, user_id: UserId, limit: usize, offset: usize) -> Result<Vec<ConversationRecord>>;

    /// Create a pending task.
    async fn create_task(&self, user_id: UserId, task: NewTask) -> Result<TaskRecord>;

    /// All of a user's tasks, oldest first.
    async fn tasks(&self, user_id: UserId) -> Result<Vec<TaskRecord>>;

    /// Store a calendar event.
    async fn add_event(&self, user_id: UserId, event: NewEvent) -> Result<CalendarEvent>;

    /// Events starting on `date` (UTC), by start time.
    async fn events_on(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<CalendarEvent>>;
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    conversations: Vec<ConversationRecord>,
    tasks: Vec<TaskRecord>,
    events: Vec<CalendarEvent>,
    next_user: i64,
    next_record: i64,
}

impl Tables {
    fn record_id(&mut self) -> i64 {
        self.next_record += 1;
        self.next_record
    }

    fn require_user(&self, user_id: UserId) -> Result<()> {
        if self.users.contains_key(&user_id) {
            Ok(())
        } else {
            Err(StoreError::UserNotFound(user_id))
        }
    }
}

/// Volatile store; everything is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        if user.name.trim().is_empty() {
            return Err(StoreError::Invalid("name must not be empty".into()));
        }
        let mut tables = self.tables.write();
        tables.next_user += 1;
        let record = UserRecord {
            id: UserId(tables.next_user),
            name: user.name,
            email: user.email,
            preferences: user.preferences,
            context: Map::new(),
            created_at: Utc::now(),
        };
        let _ = tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn user(&self, user_id: UserId) -> Result<UserRecord> {
        self.tables
            .read()
            .users
            .get(&user_id)
            .cloned()
            .ok_or(StoreError::UserNotFound(user_id))
    }

    async fn set_user_context(&self, user_id: UserId, context: Map<String, Value>) -> Result<UserRecord> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.context = context;
        Ok(user.clone())
    }

    async fn add_conversation(&self, user_id: UserId, conversation: NewConversation) -> Result<ConversationRecord> {
        let mut tables = self.tables.write();
        tables.require_user(user_id)?;
        let record = ConversationRecord {
            id: tables.record_id(),
            user_id,
            user_message: conversation.user_message,
            ai_response: conversation.ai_response,
            context: conversation.context,
            intent: conversation.intent,
            timestamp: Utc::now(),
        };
        tables.conversations.push(record.clone());
        Ok(record)
    }

    async fn conversations(&self, user_id: UserId, limit: usize, offset: usize) -> Result<Vec<ConversationRecord>> {
        let tables = self.tables.read();
        let mut found: Vec<ConversationRecord> = tables
            .conversations
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        // Newest first; ids break timestamp ties.
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(found.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_task(&self, user_id: UserId, task: NewTask) -> Result<TaskRecord> {
        if task.title.trim().is_empty() {
            return Err(StoreError::Invalid("title must not be empty".into()));
        }
        let mut tables = self.tables.write();
        tables.require_user(user_id)?;
        let record = TaskRecord {
            id: tables.record_id(),
            user_id,
            title: task.title,
            description: task.description,
            status: TaskStatus::Pending,
            priority: task.priority,
            due_date: task.due_date,
            created_at: Utc::now(),
            completed_at: None,
        };
        tables.tasks.push(record.clone());
        Ok(record)
    }

    async fn tasks(&self, user_id: UserId) -> Result<Vec<TaskRecord>> {
        Ok(self
            .tables
            .read()
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn add_event(&self, user_id: UserId, event: NewEvent) -> Result<CalendarEvent> {
        if event.end < event.start {
            return Err(StoreError::Invalid("event ends before it starts".into()));
        }
        let mut tables = self.tables.write();
        tables.require_user(user_id)?;
        let record = CalendarEvent {
            id: tables.record_id(),
            user_id,
            title: event.title,
            description: event.description,
            start: event.start,
            end: event.end,
            location: event.location,
        };
        tables.events.push(record.clone());
        Ok(record)
    }

    async fn events_on(&self, user_id: UserId, date: NaiveDate) -> Result<Vec<CalendarEvent>> {
        let mut found: Vec<CalendarEvent> = self
            .tables
            .read()
            .events
            .iter()
            .filter(|e| e.user_id == user_id && e.start.date_naive() == date)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{Duration, TimeZone};

    async fn store_with_user() -> (MemoryStore, UserId) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser {
                name: "Asha".into(),
                email: "asha@example.com".into(),
                preferences: Map::new(),
            })
            .await
            .unwrap();
        (store, user.id)
    }

    fn exchange(text: &str) -> NewConversation {
        NewConversation {
            user_message: text.into(),
            ai_response: "ok".into(),
            context: Map::new(),
            intent: None,
        }
    }

    #[tokio::test]
    async fn user_ids_start_at_one() {
        let (store, id) = store_with_user().await;
        assert_eq!(id, UserId(1));
        assert_eq!(store.user(id).await.unwrap().name, "Asha");
        assert_matches!(store.user(UserId(2)).await, Err(StoreError::UserNotFound(UserId(2))));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let store = MemoryStore::new();
        let result = store
            .create_user(NewUser {
                name: "  ".into(),
                email: String::new(),
                preferences: Map::new(),
            })
            .await;
        assert_matches!(result, Err(StoreError::Invalid(_)));
    }

    #[tokio::test]
    async fn context_is_replaced() {
        let (store, id) = store_with_user().await;
        let mut ctx = Map::new();
        let _ = ctx.insert("mood".into(), Value::from("positive"));
        let user = store.set_user_context(id, ctx).await.unwrap();
        assert_eq!(user.context["mood"], "positive");
    }

    #[tokio::test]
    async fn conversations_newest_first_with_paging() {
        let (store, id) = store_with_user().await;
        for text in ["a", "b", "c"] {
            let _ = store.add_conversation(id, exchange(text)).await.unwrap();
        }
        let page = store.conversations(id, 2, 0).await.unwrap();
        let texts: Vec<&str> = page.iter().map(|c| c.user_message.as_str()).collect();
        assert_eq!(texts, ["c", "b"]);
        let rest = store.conversations(id, 2, 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].user_message, "a");
    }

    #[tokio::test]
    async fn records_require_a_user() {
        let store = MemoryStore::new();
        assert_matches!(
            store.add_conversation(UserId(1), exchange("x")).await,
            Err(StoreError::UserNotFound(_))
        );
        let task = NewTask {
            title: "t".into(),
            ..NewTask::default()
        };
        assert_matches!(store.create_task(UserId(1), task).await, Err(StoreError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn tasks_start_pending() {
        let (store, id) = store_with_user().await;
        let task = store
            .create_task(
                id,
                NewTask {
                    title: "Buy milk".into(),
                    priority: TaskPriority::High,
                    ..NewTask::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(store.tasks(id).await.unwrap().len(), 1);
        assert!(store.tasks(UserId(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_on_filters_by_day() {
        let (store, id) = store_with_user().await;
        let morning = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        for start in [morning + Duration::hours(5), morning, morning + Duration::days(1)] {
            let _ = store
                .add_event(
                    id,
                    NewEvent {
                        title: "standup".into(),
                        description: None,
                        start,
                        end: start + Duration::minutes(15),
                        location: None,
                    },
                )
                .await
                .unwrap();
        }
        let events = store.events_on(id, morning.date_naive()).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].start, morning);
    }

    #[tokio::test]
    async fn inverted_event_is_rejected() {
        let (store, id) = store_with_user().await;
        let start = Utc::now();
        let result = store
            .add_event(
                id,
                NewEvent {
                    title: "x".into(),
                    description: None,
                    start,
                    end: start - Duration::minutes(1),
                    location: None,
                },
            )
            .await;
        assert_matches!(result, Err(StoreError::Invalid(_)));
    }
}
