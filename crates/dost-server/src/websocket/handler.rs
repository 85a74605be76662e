//! Inbound frame dispatch.

use dost_core::{InboundMessage, OutboundMessage};
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::registry::ConnectionManager;

/// Metric label for an inbound frame. Unknown types share one label.
fn label(message: &InboundMessage) -> &'static str {
    match message {
        InboundMessage::Ping => "ping",
        InboundMessage::Typing { .. } => "typing",
        InboundMessage::VoiceData { .. } => "voice_data",
        InboundMessage::UserStatus { .. } => "user_status",
        InboundMessage::Unknown { .. } => "unknown",
    }
}

/// Parse and act on one text frame from `conn`.
///
/// Malformed frames are logged and dropped; the connection stays open.
pub async fn handle_text(manager: &ConnectionManager, conn: &ClientConnection, text: &str) {
    let message = match InboundMessage::parse(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(user_id = %conn.user_id, conn_id = %conn.id, error = %e, "dropping malformed frame");
            return;
        }
    };
    manager.record_inbound(conn.user_id, label(&message)).await;

    match message {
        InboundMessage::Ping => {
            let _ = manager.send_to_connection(conn, OutboundMessage::pong());
        }
        InboundMessage::Typing { is_typing } => {
            debug!(user_id = %conn.user_id, is_typing, "typing");
        }
        InboundMessage::VoiceData { payload } => {
            debug!(user_id = %conn.user_id, has_payload = !payload.is_null(), "voice data received");
            let _ = manager
                .send_to_user(conn.user_id, OutboundMessage::voice_received())
                .await;
        }
        InboundMessage::UserStatus { status } => {
            let _ = manager.set_status(conn.user_id, &status).await;
            info!(user_id = %conn.user_id, status = %status, "status updated");
        }
        InboundMessage::Unknown { kind, .. } => {
            warn!(user_id = %conn.user_id, kind = %kind, "unknown message type");
        }
    }
}
