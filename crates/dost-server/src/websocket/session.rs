//! Per-user session view and connection manager snapshots.

use chrono::{DateTime, Utc};
use dost_core::{ConnectionId, UserId};
use serde::Serialize;
use serde_json::{Map, Value};

/// Status a session starts with.
pub const DEFAULT_STATUS: &str = "online";

/// One per user with at least one open connection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserSession {
    /// Owner.
    pub user_id: UserId,
    /// When the first of the current connections opened.
    pub connected_at: DateTime<Utc>,
    /// Last registration or inbound message.
    pub last_activity: DateTime<Utc>,
    /// Open connections.
    pub connection_count: usize,
    /// Free-form status set by the client (`user_status` frames).
    pub status: String,
    /// Session metadata shared by all of the user's connections.
    pub session_data: Map<String, Value>,
}

impl UserSession {
    pub(crate) fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            connected_at: now,
            last_activity: now,
            connection_count: 0,
            status: DEFAULT_STATUS.to_owned(),
            session_data: Map::new(),
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// Metadata of one open connection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectionInfo {
    /// Connection id, also sent to the client as `session_id`.
    pub connection_id: ConnectionId,
    /// Owner.
    pub user_id: UserId,
    /// Establishment time.
    pub connected_at: DateTime<Utc>,
}

/// Counters reported by `GET /status`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    /// Connections ever registered.
    pub total_connections: u64,
    /// Connections open now.
    pub active_connections: usize,
    /// Frames accepted by a connection.
    pub messages_sent: u64,
    /// Inbound frames parsed.
    pub messages_received: u64,
    /// Users with at least one open connection.
    pub active_users: usize,
    /// Users with queued offline messages.
    pub offline_message_queues: usize,
    /// Queued offline messages across users.
    pub total_offline_messages: usize,
}
