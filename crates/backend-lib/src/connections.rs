// ============================
// chatware-backend-lib/src/connections.rs
// ============================
//! Connection registry: the live mapping from user identity to its open
//! signaling connection.
//!
//! Each entry holds the bounded outbound queue of one WebSocket connection.
//! Delivery is best-effort and non-blocking: a stalled receiver fills its own
//! queue and starts dropping messages without ever stalling the relay loop
//! that is delivering to it.
use crate::messages::ServerMessage;
use crate::metrics as keys;
use axum::extract::ws::Message;
use chatware_common::UserId;
use dashmap::DashMap;
use metrics::counter;
use tracing::warn;
use uuid::Uuid;

/// Handle to one live connection's outbound queue.
///
/// The `conn_id` distinguishes this connection from any later connection the
/// same user opens; unregistration is guarded by it so a superseded
/// connection's exit cleanup cannot evict its replacement.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub conn_id: Uuid,
    tx: tokio::sync::mpsc::Sender<Message>,
}

impl ConnectionHandle {
    pub fn new(tx: tokio::sync::mpsc::Sender<Message>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }

    /// Non-blocking enqueue; returns false if the queue is full or the
    /// connection has gone away.
    pub fn try_forward(&self, message: Message) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                counter!(keys::SIGNAL_DROPPED).increment(1);
                warn!(conn_id = %self.conn_id, error = %e, "dropping outbound message");
                false
            },
        }
    }
}

/// Registry of all live signaling connections, one per user identity
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: DashMap<UserId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, unconditionally replacing any prior
    /// entry. Returns the superseded handle so the caller can log the
    /// replacement; the old socket is not closed or notified (known gap).
    pub fn register(&self, user_id: UserId, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.entries.insert(user_id, handle)
    }

    /// Remove the entry for `user_id` only if it still belongs to `conn_id`
    pub fn unregister(&self, user_id: &str, conn_id: Uuid) {
        self.entries
            .remove_if(user_id, |_, handle| handle.conn_id == conn_id);
    }

    pub fn lookup(&self, user_id: &str) -> Option<ConnectionHandle> {
        self.entries.get(user_id).map(|entry| entry.value().clone())
    }

    /// Forward a raw inbound frame verbatim to a user's connection.
    /// Returns false if the user has no live connection.
    pub fn forward_raw(&self, user_id: &str, raw: &str) -> bool {
        match self.lookup(user_id) {
            Some(handle) => handle.try_forward(Message::Text(raw.to_string().into())),
            None => false,
        }
    }

    /// Serialize and deliver a server event to a user, best-effort.
    /// Users with no live connection are skipped silently.
    pub fn send(&self, user_id: &str, message: &ServerMessage) {
        let Some(handle) = self.lookup(user_id) else {
            return;
        };
        match serde_json::to_string(message) {
            Ok(json) => {
                handle.try_forward(Message::Text(json.into()));
            },
            Err(e) => warn!(user = %user_id, error = %e, "failed to serialize server event"),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
