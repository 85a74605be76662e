//! Connection manager: per-user registry, dispatcher, offline queue and idle sweep.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use dost_core::{ConnectionId, OutboundMessage, UserId};
use dost_settings::WebSocketSettings;
use metrics::{counter, gauge};
use serde_json::{Map, Value};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::ClientConnection;
use super::queue::OfflineQueue;
use super::session::{ConnectionInfo, ConnectionStats, UserSession};
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_MESSAGES_RECEIVED_TOTAL,
    WS_MESSAGES_SENT_TOTAL, WS_OFFLINE_DROPPED_TOTAL, WS_OFFLINE_QUEUED_TOTAL,
    WS_SWEEP_REMOVED_TOTAL,
};

/// Shortest sweep period accepted; `interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Registry maps. A user key exists in both maps iff it has ≥1 open connection.
#[derive(Default)]
struct Registry {
    connections: HashMap<UserId, Vec<Arc<ClientConnection>>>,
    sessions: HashMap<UserId, UserSession>,
}

/// Owns every open connection and delivers messages to them.
///
/// Delivery is best-effort and at-most-once: a connection whose send fails
/// is unregistered, and nothing is retried. Messages for users with no open
/// connection wait in a bounded offline queue until the user reconnects.
pub struct ConnectionManager {
    registry: RwLock<Registry>,
    queue: parking_lot::Mutex<OfflineQueue>,
    total_connections: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    outbound_buffer: usize,
    idle_threshold: Duration,
    sweep_interval: Duration,
    shutdown: CancellationToken,
    sweeper: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Build from settings. Nothing runs until [`start`](Self::start).
    pub fn new(settings: &WebSocketSettings) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            queue: parking_lot::Mutex::new(OfflineQueue::new(settings.offline_queue_capacity)),
            total_connections: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            // A full replay plus the confirmation must fit before the writer drains.
            outbound_buffer: settings
                .outbound_buffer
                .max(settings.offline_queue_capacity + 1),
            idle_threshold: settings.idle_threshold(),
            sweep_interval: settings.sweep_interval().max(MIN_SWEEP_INTERVAL),
            shutdown: CancellationToken::new(),
            sweeper: parking_lot::Mutex::new(None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registry
    // ─────────────────────────────────────────────────────────────────────

    /// Unregistered connection with its outbound receiver.
    ///
    /// Lets the caller start draining the receiver before [`register`](Self::register).
    pub fn open(&self, user_id: UserId) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        (Arc::new(ClientConnection::new(user_id, tx)), rx)
    }

    /// Create and register a connection, returning it with its outbound receiver.
    pub async fn connect(
        &self,
        user_id: UserId,
        metadata: Map<String, Value>,
    ) -> (Arc<ClientConnection>, mpsc::Receiver<Arc<String>>) {
        let (conn, rx) = self.open(user_id);
        self.register(Arc::clone(&conn), metadata).await;
        (conn, rx)
    }

    /// Register an open connection.
    ///
    /// Sends `connection_confirmed` to it; if this is the user's only
    /// connection, replays the offline queue wrapped as `offline_message`.
    /// Confirmation and replay happen under the registry write lock, so a
    /// concurrent [`send_to_user`](Self::send_to_user) either lands in the
    /// flushed queue or is delivered after the replay.
    pub async fn register(&self, connection: Arc<ClientConnection>, metadata: Map<String, Value>) {
        let user_id = connection.user_id;
        let now = Utc::now();
        let (count, replay) = {
            let mut guard = self.registry.write().await;
            let registry = &mut *guard;
            let list = registry.connections.entry(user_id).or_default();
            list.push(Arc::clone(&connection));
            let count = list.len();
            let session = registry
                .sessions
                .entry(user_id)
                .or_insert_with(|| UserSession::new(user_id, now));
            session.connection_count = count;
            session.touch(now);
            session.session_data.extend(metadata);

            let confirmed = OutboundMessage::connection_confirmed(user_id, &connection.id);
            let confirmed = self.send_to_connection(&connection, confirmed);
            let replay = if count == 1 {
                let pending = self.queue.lock().flush(user_id);
                self.replay_offline(&connection, &pending)
            } else {
                Replay::default()
            };
            (count, Replay { confirmed, ..replay })
        };

        let _ = self.total_connections.fetch_add(1, Ordering::Relaxed);
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        info!(user_id = %user_id, conn_id = %connection.id, connections = count, "connection registered");

        if replay.total > 0 {
            if replay.lost > 0 {
                counter!(WS_OFFLINE_DROPPED_TOTAL, "reason" => "replay").increment(replay.lost as u64);
            }
            info!(user_id = %user_id, total = replay.total, lost = replay.lost, "replayed offline messages");
        }
        if !replay.confirmed || replay.lost > 0 {
            warn!(user_id = %user_id, conn_id = %connection.id, "send failed on registration, dropping connection");
            let _ = self.unregister(user_id, Some(&connection.id)).await;
        }
    }

    /// Remove one connection (`Some(id)`) or all of a user's connections (`None`).
    ///
    /// Removed connections are closed. Returns how many were removed; unknown
    /// users or ids are a no-op.
    pub async fn unregister(&self, user_id: UserId, connection_id: Option<&ConnectionId>) -> usize {
        let removed = {
            let mut guard = self.registry.write().await;
            let registry = &mut *guard;
            let Some(list) = registry.connections.get_mut(&user_id) else {
                return 0;
            };
            let removed = match connection_id {
                Some(id) => list
                    .iter()
                    .position(|c| &c.id == id)
                    .map(|i| vec![list.remove(i)])
                    .unwrap_or_default(),
                None => std::mem::take(list),
            };
            if list.is_empty() {
                let _ = registry.connections.remove(&user_id);
                let _ = registry.sessions.remove(&user_id);
            } else if let Some(session) = registry.sessions.get_mut(&user_id) {
                session.connection_count = list.len();
            }
            removed
        };

        for conn in &removed {
            conn.close();
        }
        if !removed.is_empty() {
            counter!(WS_DISCONNECTIONS_TOTAL).increment(removed.len() as u64);
            gauge!(WS_CONNECTIONS_ACTIVE).decrement(removed.len() as f64);
            info!(user_id = %user_id, removed = removed.len(), "connections unregistered");
        }
        removed.len()
    }

    /// Users with at least one open connection.
    pub async fn active_users(&self) -> HashSet<UserId> {
        self.registry.read().await.connections.keys().copied().collect()
    }

    /// Open connections for a user.
    pub async fn connection_count(&self, user_id: UserId) -> usize {
        self.registry
            .read()
            .await
            .connections
            .get(&user_id)
            .map_or(0, Vec::len)
    }

    /// Metadata of a user's open connections.
    pub async fn connections(&self, user_id: UserId) -> Vec<ConnectionInfo> {
        self.registry
            .read()
            .await
            .connections
            .get(&user_id)
            .map(|list| list.iter().map(|c| c.info()).collect())
            .unwrap_or_default()
    }

    /// Session of a connected user.
    pub async fn session(&self, user_id: UserId) -> Option<UserSession> {
        self.registry.read().await.sessions.get(&user_id).cloned()
    }

    /// Snapshot of every session.
    pub async fn sessions(&self) -> Vec<UserSession> {
        self.registry.read().await.sessions.values().cloned().collect()
    }

    /// Count an inbound frame and touch the user's session.
    pub async fn record_inbound(&self, user_id: UserId, kind: &'static str) {
        let _ = self.messages_received.fetch_add(1, Ordering::Relaxed);
        counter!(WS_MESSAGES_RECEIVED_TOTAL, "type" => kind).increment(1);
        if let Some(session) = self.registry.write().await.sessions.get_mut(&user_id) {
            session.touch(Utc::now());
        }
    }

    /// Set a connected user's status string. `false` if the user has no session.
    pub async fn set_status(&self, user_id: UserId, status: &str) -> bool {
        let mut registry = self.registry.write().await;
        match registry.sessions.get_mut(&user_id) {
            Some(session) => {
                status.clone_into(&mut session.status);
                session.touch(Utc::now());
                true
            }
            None => false,
        }
    }

    /// Counters and sizes.
    pub async fn stats(&self) -> ConnectionStats {
        let (active_connections, active_users) = {
            let registry = self.registry.read().await;
            (
                registry.connections.values().map(Vec::len).sum(),
                registry.connections.len(),
            )
        };
        let queue = self.queue.lock();
        ConnectionStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections,
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            active_users,
            offline_message_queues: queue.queue_count(),
            total_offline_messages: queue.total(),
        }
    }

    /// Messages waiting for an offline user.
    pub fn queued_for(&self, user_id: UserId) -> usize {
        self.queue.lock().len(user_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Dispatch
    // ─────────────────────────────────────────────────────────────────────

    /// Stamp and send to a single connection, bypassing the registry.
    pub fn send_to_connection(&self, connection: &ClientConnection, mut message: OutboundMessage) -> bool {
        message.stamp();
        let json = match message.to_json() {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(kind = %message.kind, error = %e, "failed to serialize message");
                return false;
            }
        };
        let sent = connection.send(json);
        if sent {
            self.record_sent(1);
        }
        sent
    }

    /// Deliver to every open connection of a user.
    ///
    /// Returns `true` if at least one connection accepted. With no open
    /// connection the message is queued and `false` is returned.
    pub async fn send_to_user(&self, user_id: UserId, mut message: OutboundMessage) -> bool {
        message.stamp();
        let targets = {
            let registry = self.registry.read().await;
            match registry.connections.get(&user_id) {
                Some(list) => list.clone(),
                None => {
                    // Enqueue under the read guard; `register` flushes under the write guard.
                    self.enqueue(user_id, message);
                    return false;
                }
            }
        };
        self.deliver(user_id, &targets, &message).await
    }

    /// Deliver to every connected user except `exclude`. Returns connections reached.
    pub async fn broadcast(&self, mut message: OutboundMessage, exclude: Option<UserId>) -> usize {
        message.stamp();
        let Some(json) = serialize(&message) else {
            return 0;
        };

        let targets: Vec<Arc<ClientConnection>> = {
            let registry = self.registry.read().await;
            registry
                .connections
                .iter()
                .filter(|(user_id, _)| Some(**user_id) != exclude)
                .flat_map(|(_, list)| list.iter().cloned())
                .collect()
        };

        let mut delivered: usize = 0;
        let mut failed = Vec::new();
        for conn in &targets {
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                failed.push((conn.user_id, conn.id.clone()));
            }
        }
        self.record_sent(delivered);

        for (user_id, conn_id) in &failed {
            warn!(user_id = %user_id, conn_id = %conn_id, "broadcast send failed, dropping connection");
            let _ = self.unregister(*user_id, Some(conn_id)).await;
        }
        debug!(kind = %message.kind, recipients = targets.len(), delivered, "broadcast");
        delivered
    }

    /// `system_notification` to one user, or to everyone when `user_id` is `None`.
    pub async fn send_system_notification(&self, message: &str, user_id: Option<UserId>) -> bool {
        let notification = OutboundMessage::system_notification(message);
        match user_id {
            Some(user_id) => self.send_to_user(user_id, notification).await,
            None => self.broadcast(notification, None).await > 0,
        }
    }

    /// `ai_response` with reply text and context.
    pub async fn send_ai_response(&self, user_id: UserId, response: &str, context: Map<String, Value>) -> bool {
        self.send_to_user(user_id, OutboundMessage::ai_response(response, context))
            .await
    }

    /// `task_notification` carrying the task fields.
    pub async fn send_task_notification(&self, user_id: UserId, task_data: Map<String, Value>) -> bool {
        self.send_to_user(user_id, OutboundMessage::task_notification(task_data))
            .await
    }

    /// `calendar_reminder` carrying the event fields.
    pub async fn send_calendar_reminder(&self, user_id: UserId, event_data: Map<String, Value>) -> bool {
        self.send_to_user(user_id, OutboundMessage::calendar_reminder(event_data))
            .await
    }

    /// Send an already-stamped message to `targets`. Failed connections are unregistered.
    async fn deliver(&self, user_id: UserId, targets: &[Arc<ClientConnection>], message: &OutboundMessage) -> bool {
        let Some(json) = serialize(message) else {
            return false;
        };

        let mut delivered: usize = 0;
        let mut failed = Vec::new();
        for conn in targets {
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                failed.push(conn.id.clone());
            }
        }
        self.record_sent(delivered);

        for conn_id in &failed {
            warn!(user_id = %user_id, conn_id = %conn_id, "send failed, dropping connection");
            let _ = self.unregister(user_id, Some(conn_id)).await;
        }
        delivered > 0
    }

    fn enqueue(&self, user_id: UserId, message: OutboundMessage) {
        let evicted = self.queue.lock().enqueue(user_id, message);
        counter!(WS_OFFLINE_QUEUED_TOTAL).increment(1);
        if evicted > 0 {
            counter!(WS_OFFLINE_DROPPED_TOTAL, "reason" => "capacity").increment(evicted as u64);
        }
        debug!(user_id = %user_id, evicted, "queued message for offline user");
    }

    /// Send `pending` to a user's first connection, wrapped as `offline_message`.
    ///
    /// Stops at the first failure; the rest count as lost and are not requeued.
    fn replay_offline(&self, connection: &ClientConnection, pending: &[OutboundMessage]) -> Replay {
        let mut replay = Replay {
            total: pending.len(),
            ..Replay::default()
        };
        for (i, original) in pending.iter().enumerate() {
            if !self.send_to_connection(connection, OutboundMessage::offline(original)) {
                replay.lost = pending.len() - i;
                break;
            }
        }
        replay
    }

    fn record_sent(&self, n: usize) {
        if n > 0 {
            let _ = self.messages_sent.fetch_add(n as u64, Ordering::Relaxed);
            counter!(WS_MESSAGES_SENT_TOTAL).increment(n as u64);
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Idle sweep and lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Unregister every connection established at least `threshold` ago.
    ///
    /// Age counts from establishment, not from last activity. Returns how
    /// many connections were removed.
    pub async fn sweep(&self, threshold: Duration) -> usize {
        let now = Utc::now();
        let stale: Vec<(UserId, ConnectionId)> = {
            let registry = self.registry.read().await;
            registry
                .connections
                .values()
                .flatten()
                .filter(|c| (now - c.connected_at).to_std().unwrap_or_default() >= threshold)
                .map(|c| (c.user_id, c.id.clone()))
                .collect()
        };

        let mut removed = 0;
        for (user_id, conn_id) in &stale {
            removed += self.unregister(*user_id, Some(conn_id)).await;
        }
        if removed > 0 {
            counter!(WS_SWEEP_REMOVED_TOTAL).increment(removed as u64);
            info!(removed, threshold_secs = threshold.as_secs(), "idle sweep closed connections");
        }
        removed
    }

    /// Spawn the periodic sweep. No-op if running or after shutdown.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweeper.lock();
        if slot.is_some() || self.shutdown.is_cancelled() {
            return;
        }

        let manager = Arc::downgrade(self);
        let token = self.shutdown.clone();
        let period = self.sweep_interval;
        let threshold = self.idle_threshold;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately.
            let _ = ticker.tick().await;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        let removed = manager.sweep(threshold).await;
                        debug!(removed, "idle sweep tick");
                    }
                }
            }
        }));
        info!(
            interval_secs = period.as_secs(),
            threshold_secs = threshold.as_secs(),
            "connection manager started"
        );
    }

    /// Stop the sweep, close every connection, drop sessions and queues. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            handle.abort();
        }

        let users: Vec<UserId> = self.registry.read().await.connections.keys().copied().collect();
        for user_id in users {
            let _ = self.unregister(user_id, None).await;
        }
        {
            let mut registry = self.registry.write().await;
            registry.connections.clear();
            registry.sessions.clear();
        }
        self.queue.lock().clear();
        info!("connection manager shut down");
    }
}

/// Outcome of the sends made while registering a connection.
#[derive(Default)]
struct Replay {
    confirmed: bool,
    total: usize,
    lost: usize,
}

fn serialize(message: &OutboundMessage) -> Option<Arc<String>> {
    match message.to_json() {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(kind = %message.kind, error = %e, "failed to serialize message");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
