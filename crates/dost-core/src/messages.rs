//! WebSocket wire messages.
//!
//! Inbound frames are JSON objects with a required `type` field and are parsed
//! into the closed [`InboundMessage`] union; anything unrecognised lands in
//! [`InboundMessage::Unknown`] so dispatch stays exhaustive.
//!
//! Outbound frames always have the shape `{type, data, timestamp}` where
//! `timestamp` is an ISO-8601 string stamped at delivery time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::ids::{ConnectionId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Reasons an inbound frame is rejected.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame is not valid JSON.
    #[error("invalid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Frame parsed but is not a JSON object.
    #[error("message must be a JSON object")]
    NotAnObject,

    /// Object has no `type` field.
    #[error("message has no `type` field")]
    MissingType,

    /// `type` is present but not a string.
    #[error("message `type` must be a string")]
    InvalidType,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound `type` values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Sent on a fresh connection after registration.
    ConnectionConfirmed,
    /// Replay wrapper for a message queued while the user was offline.
    OfflineMessage,
    /// Operator or system notice.
    SystemNotification,
    /// Assistant reply pushed to the user.
    AiResponse,
    /// Task-related notice.
    TaskNotification,
    /// Calendar reminder.
    CalendarReminder,
    /// Reply to an inbound `ping`.
    Pong,
    /// Acknowledgement of inbound `voice_data`.
    VoiceReceived,
    /// A chat exchange (user message + assistant reply) was recorded.
    Conversation,
    /// A task was created over HTTP.
    TaskCreated,
    /// Any other type string.
    Other(String),
}

impl MessageType {
    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::ConnectionConfirmed => "connection_confirmed",
            Self::OfflineMessage => "offline_message",
            Self::SystemNotification => "system_notification",
            Self::AiResponse => "ai_response",
            Self::TaskNotification => "task_notification",
            Self::CalendarReminder => "calendar_reminder",
            Self::Pong => "pong",
            Self::VoiceReceived => "voice_received",
            Self::Conversation => "conversation",
            Self::TaskCreated => "task_created",
            Self::Other(s) => s,
        }
    }
}

impl From<String> for MessageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "connection_confirmed" => Self::ConnectionConfirmed,
            "offline_message" => Self::OfflineMessage,
            "system_notification" => Self::SystemNotification,
            "ai_response" => Self::AiResponse,
            "task_notification" => Self::TaskNotification,
            "calendar_reminder" => Self::CalendarReminder,
            "pong" => Self::Pong,
            "voice_received" => Self::VoiceReceived,
            "conversation" => Self::Conversation,
            "task_created" => Self::TaskCreated,
            _ => Self::Other(value),
        }
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server → client message envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message type.
    #[serde(rename = "type")]
    pub kind: MessageType,
    /// Type-specific payload (always an object on the wire).
    #[serde(default = "empty_object")]
    pub data: Value,
    /// Delivery timestamp, set by the dispatcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl OutboundMessage {
    /// Build an unstamped message.
    pub fn new(kind: MessageType, data: Value) -> Self {
        Self {
            kind,
            data,
            timestamp: None,
        }
    }

    /// Overwrite the delivery timestamp with the current time.
    pub fn stamp(&mut self) {
        self.timestamp = Some(Utc::now());
    }

    /// Builder form of [`stamp`](Self::stamp).
    #[must_use]
    pub fn stamped(mut self) -> Self {
        self.stamp();
        self
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `connection_confirmed` for a freshly registered connection.
    pub fn connection_confirmed(user_id: UserId, session_id: &ConnectionId) -> Self {
        Self::new(
            MessageType::ConnectionConfirmed,
            json!({
                "user_id": user_id,
                "session_id": session_id,
                "timestamp": Utc::now(),
            }),
        )
    }

    /// `pong` reply.
    pub fn pong() -> Self {
        Self::new(MessageType::Pong, empty_object())
    }

    /// Wrap a previously queued message for replay after reconnect.
    pub fn offline(original: &OutboundMessage) -> Self {
        let data = serde_json::to_value(original).unwrap_or_default();
        Self::new(MessageType::OfflineMessage, data)
    }

    /// `system_notification` with `severity: "info"`.
    pub fn system_notification(message: &str) -> Self {
        Self::new(
            MessageType::SystemNotification,
            json!({
                "message": message,
                "timestamp": Utc::now(),
                "severity": "info",
            }),
        )
    }

    /// `ai_response` carrying reply text and the conversation context.
    pub fn ai_response(response: &str, context: Map<String, Value>) -> Self {
        Self::new(
            MessageType::AiResponse,
            json!({
                "response": response,
                "context": context,
                "timestamp": Utc::now(),
            }),
        )
    }

    /// `task_notification`; `task_data` fields are flattened into `data`.
    pub fn task_notification(task_data: Map<String, Value>) -> Self {
        Self::new(MessageType::TaskNotification, with_inner_timestamp(task_data))
    }

    /// `calendar_reminder`; `event_data` fields are flattened into `data`.
    pub fn calendar_reminder(event_data: Map<String, Value>) -> Self {
        Self::new(MessageType::CalendarReminder, with_inner_timestamp(event_data))
    }

    /// `voice_received` acknowledgement with `status: "processing"`.
    pub fn voice_received() -> Self {
        Self::new(
            MessageType::VoiceReceived,
            json!({
                "status": "processing",
                "timestamp": Utc::now(),
            }),
        )
    }
}

fn with_inner_timestamp(mut data: Map<String, Value>) -> Value {
    let _ = data.insert("timestamp".into(), json!(Utc::now()));
    Value::Object(data)
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Client → server message.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    /// Liveness probe; answered with `pong`.
    Ping,
    /// Typing indicator.
    Typing {
        /// Whether the user is typing (defaults to `false`).
        is_typing: bool,
    },
    /// Voice payload; audio handling belongs to the transcription collaborator.
    VoiceData {
        /// The frame's `data` field, `null` when absent.
        payload: Value,
    },
    /// Presence/status update.
    UserStatus {
        /// New status string (defaults to `"online"`).
        status: String,
    },
    /// Any other `type`; kept verbatim.
    Unknown {
        /// The unrecognised `type` value.
        kind: String,
        /// The whole frame.
        raw: Value,
    },
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Classify an already-decoded frame.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Value::Object(map) = value else {
            return Err(ProtocolError::NotAnObject);
        };
        let kind = match map.get("type") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(ProtocolError::InvalidType),
            None => return Err(ProtocolError::MissingType),
        };

        let message = match kind.as_str() {
            "ping" => Self::Ping,
            "typing" => Self::Typing {
                is_typing: field(&map, "is_typing")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            "voice_data" => Self::VoiceData {
                payload: map.get("data").cloned().unwrap_or(Value::Null),
            },
            "user_status" => Self::UserStatus {
                status: field(&map, "status")
                    .and_then(Value::as_str)
                    .unwrap_or("online")
                    .to_owned(),
            },
            _ => Self::Unknown {
                kind,
                raw: Value::Object(map),
            },
        };
        Ok(message)
    }

    /// The `type` string this message was parsed from.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Ping => "ping",
            Self::Typing { .. } => "typing",
            Self::VoiceData { .. } => "voice_data",
            Self::UserStatus { .. } => "user_status",
            Self::Unknown { kind, .. } => kind,
        }
    }
}

/// Look a field up at the top level, then inside a nested `data` object.
fn field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key)
        .or_else(|| map.get("data").and_then(|d| d.get(key)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // ── inbound ──────────────────────────────────────────────────────────

    #[test]
    fn parse_ping() {
        assert_eq!(InboundMessage::parse(r#"{"type":"ping"}"#).unwrap(), InboundMessage::Ping);
    }

    #[test]
    fn parse_typing_defaults_to_false() {
        let msg = InboundMessage::parse(r#"{"type":"typing"}"#).unwrap();
        assert_eq!(msg, InboundMessage::Typing { is_typing: false });

        let msg = InboundMessage::parse(r#"{"type":"typing","is_typing":true}"#).unwrap();
        assert_eq!(msg, InboundMessage::Typing { is_typing: true });
    }

    #[test]
    fn parse_user_status_reads_nested_data() {
        let msg =
            InboundMessage::parse(r#"{"type":"user_status","data":{"status":"busy"}}"#).unwrap();
        assert_eq!(msg, InboundMessage::UserStatus { status: "busy".into() });
    }

    #[test]
    fn parse_user_status_defaults_to_online() {
        let msg = InboundMessage::parse(r#"{"type":"user_status"}"#).unwrap();
        assert_eq!(msg, InboundMessage::UserStatus { status: "online".into() });
    }

    #[test]
    fn parse_voice_data_keeps_payload() {
        let msg = InboundMessage::parse(r#"{"type":"voice_data","data":{"chunk":1}}"#).unwrap();
        assert_matches!(msg, InboundMessage::VoiceData { payload } if payload["chunk"] == 1);
    }

    #[test]
    fn parse_unknown_type_keeps_raw_frame() {
        let msg = InboundMessage::parse(r#"{"type":"dance","speed":3}"#).unwrap();
        assert_matches!(msg, InboundMessage::Unknown { ref kind, ref raw } if kind == "dance" && raw["speed"] == 3);
        assert_eq!(msg.kind(), "dance");
    }

    #[test]
    fn parse_rejects_invalid_json() {
        assert_matches!(InboundMessage::parse("{not json"), Err(ProtocolError::InvalidJson(_)));
    }

    #[test]
    fn parse_rejects_missing_type() {
        assert_matches!(InboundMessage::parse(r#"{"foo":1}"#), Err(ProtocolError::MissingType));
    }

    #[test]
    fn parse_rejects_non_string_type() {
        assert_matches!(InboundMessage::parse(r#"{"type":5}"#), Err(ProtocolError::InvalidType));
    }

    #[test]
    fn parse_rejects_non_object() {
        assert_matches!(InboundMessage::parse("[1,2]"), Err(ProtocolError::NotAnObject));
    }

    // ── outbound ─────────────────────────────────────────────────────────

    #[test]
    fn outbound_wire_shape() {
        let msg = OutboundMessage::pong().stamped();
        let v: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(v["type"], "pong");
        assert!(v["data"].is_object());
        assert!(v["timestamp"].is_string());
    }

    #[test]
    fn unstamped_message_omits_timestamp() {
        let v = serde_json::to_value(OutboundMessage::pong()).unwrap();
        assert!(v.get("timestamp").is_none());
    }

    #[test]
    fn message_type_round_trips_unknown_strings() {
        let v: OutboundMessage =
            serde_json::from_str(r#"{"type":"custom_kind","data":{"a":1}}"#).unwrap();
        assert_eq!(v.kind, MessageType::Other("custom_kind".into()));
        assert_eq!(serde_json::to_value(&v).unwrap()["type"], "custom_kind");
    }

    #[test]
    fn known_type_strings_map_to_variants() {
        assert_eq!(MessageType::from("task_notification".to_owned()), MessageType::TaskNotification);
        assert_eq!(MessageType::TaskNotification.as_str(), "task_notification");
    }

    #[test]
    fn offline_wrapper_embeds_original() {
        let original = OutboundMessage::new(
            MessageType::TaskNotification,
            json!({"id": 1}),
        )
        .stamped();
        let wrapped = OutboundMessage::offline(&original);
        assert_eq!(wrapped.kind, MessageType::OfflineMessage);
        assert_eq!(wrapped.data["type"], "task_notification");
        assert_eq!(wrapped.data["data"]["id"], 1);
        assert!(wrapped.data["timestamp"].is_string());
    }

    #[test]
    fn task_notification_flattens_fields() {
        let mut task = Map::new();
        let _ = task.insert("id".into(), json!(9));
        let msg = OutboundMessage::task_notification(task);
        assert_eq!(msg.data["id"], 9);
        assert!(msg.data["timestamp"].is_string());
    }

    #[test]
    fn system_notification_is_info() {
        let msg = OutboundMessage::system_notification("maintenance");
        assert_eq!(msg.data["severity"], "info");
        assert_eq!(msg.data["message"], "maintenance");
    }

    #[test]
    fn connection_confirmed_carries_ids() {
        let id = ConnectionId::from("sess-1");
        let msg = OutboundMessage::connection_confirmed(UserId(42), &id);
        assert_eq!(msg.data["user_id"], 42);
        assert_eq!(msg.data["session_id"], "sess-1");
    }
}
