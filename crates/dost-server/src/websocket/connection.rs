//! Client connection handle and the per-socket read/write loops.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use chrono::{DateTime, Utc};
use dost_core::{ConnectionId, UserId};
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handler;
use super::registry::ConnectionManager;
use super::session::ConnectionInfo;

/// Lifecycle of a connection once the manager knows about it.
///
/// The HTTP upgrade finishes before a [`ClientConnection`] is built, so
/// the connecting phase is never observed here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Sends are accepted.
    Open,
    /// Terminal; every send fails.
    Closed,
}

/// Server-side handle for one WebSocket.
///
/// Outbound frames go through a bounded channel drained by the writer task;
/// `send` never blocks.
pub struct ClientConnection {
    /// Generated id, reported to the client as `session_id`.
    pub id: ConnectionId,
    /// Owner.
    pub user_id: UserId,
    /// Establishment time; the idle sweep measures age from here.
    pub connected_at: DateTime<Utc>,
    tx: mpsc::Sender<Arc<String>>,
    closed: CancellationToken,
}

impl ClientConnection {
    /// Open connection feeding `tx`.
    pub fn new(user_id: UserId, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::generate(),
            user_id,
            connected_at: Utc::now(),
            tx,
            closed: CancellationToken::new(),
        }
    }

    /// Queue a text frame. `false` if closed, full, or the writer is gone.
    pub fn send(&self, message: Arc<String>) -> bool {
        if self.closed.is_cancelled() {
            return false;
        }
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, user_id = %self.user_id, "outbound buffer full");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Mark closed; the writer sends a close frame and stops. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        if self.closed.is_cancelled() {
            ConnectionState::Closed
        } else {
            ConnectionState::Open
        }
    }

    /// Token cancelled by [`close`](Self::close).
    pub fn close_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Snapshot of the connection metadata.
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            connection_id: self.id.clone(),
            user_id: self.user_id,
            connected_at: self.connected_at,
        }
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("connected_at", &self.connected_at)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Drive an upgraded socket until the client leaves or the manager closes it.
pub async fn run_connection(
    socket: WebSocket,
    manager: Arc<ConnectionManager>,
    user_id: UserId,
    metadata: Map<String, Value>,
) {
    let (mut sink, mut stream) = socket.split();
    let (conn, mut rx) = manager.open(user_id);

    let close = conn.close_token();
    let conn_id = conn.id.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                frame = rx.recv() => {
                    let Some(text) = frame else { break };
                    if let Err(e) = sink.send(Message::Text(String::clone(&text).into())).await {
                        debug!(conn_id = %conn_id, error = %e, "write failed");
                        break;
                    }
                }
                () = close.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });
    // Registered only once the writer drains, so confirmation and replay flow straight out.
    manager.register(Arc::clone(&conn), metadata).await;

    let closed = conn.close_token();
    loop {
        let frame = tokio::select! {
            frame = stream.next() => frame,
            () = closed.cancelled() => break,
        };
        match frame {
            Some(Ok(Message::Text(text))) => {
                handler::handle_text(&manager, &conn, text.as_str()).await;
            }
            Some(Ok(Message::Binary(data))) => {
                debug!(conn_id = %conn.id, len = data.len(), "ignoring binary frame");
            }
            // axum answers pings itself.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                info!(user_id = %user_id, conn_id = %conn.id, reason = ?frame, "client closed");
                break;
            }
            Some(Err(e)) => {
                warn!(user_id = %user_id, conn_id = %conn.id, error = %e, "receive error");
                break;
            }
            None => break,
        }
    }

    let _ = manager.unregister(user_id, Some(&conn.id)).await;
    conn.close();
    let _ = writer.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_until_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = ClientConnection::new(UserId(1), tx);
        assert!(conn.send(Arc::new("a".into())));
        assert!(!conn.send(Arc::new("b".into())));
        assert_eq!(rx.try_recv().unwrap().as_str(), "a");
        assert!(conn.send(Arc::new("c".into())));
    }

    #[test]
    fn closed_connection_rejects_sends() {
        let (tx, _rx) = mpsc::channel(4);
        let conn = ClientConnection::new(UserId(1), tx);
        assert_eq!(conn.state(), ConnectionState::Open);
        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.send(Arc::new("x".into())));
    }

    #[test]
    fn dropped_receiver_fails_send() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let conn = ClientConnection::new(UserId(1), tx);
        assert!(!conn.send(Arc::new("x".into())));
    }

    #[test]
    fn ids_are_unique() {
        let (tx, _rx) = mpsc::channel(1);
        let a = ClientConnection::new(UserId(1), tx.clone());
        let b = ClientConnection::new(UserId(1), tx);
        assert_ne!(a.id, b.id);
        assert_eq!(a.info().user_id, UserId(1));
    }
}
