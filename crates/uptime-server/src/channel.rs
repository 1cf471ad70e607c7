//! Per-user real-time channels.

use crate::types::{ConnectionId, ServerEvent};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uptime::types::UserId;

struct Subscriber {
    connection_id: ConnectionId,
    tx: mpsc::Sender<ServerEvent>,
}

/// Live connections grouped by user
pub struct ChannelHub {
    users: DashMap<UserId, Vec<Subscriber>>,
    buffer: usize,
}

impl ChannelHub {
    /// Create a hub whose connections queue up to `buffer` events each
    pub fn new(buffer: usize) -> Self {
        Self {
            users: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Subscribe a connection to its user's channel.
    ///
    /// Joining again with the same connection ID replaces the old subscription.
    pub fn join(&self, user_id: UserId, connection_id: ConnectionId) -> mpsc::Receiver<ServerEvent> {
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut subscribers = self.users.entry(user_id).or_default();
        subscribers.retain(|s| s.connection_id != connection_id);
        subscribers.push(Subscriber { connection_id, tx });
        debug!(user_id, connection_id, "Connection joined user channel");
        rx
    }

    /// Remove a connection from its user's channel
    pub fn leave(&self, user_id: UserId, connection_id: ConnectionId) {
        if let Some(mut subscribers) = self.users.get_mut(&user_id) {
            subscribers.retain(|s| s.connection_id != connection_id);
        }
        self.users.remove_if(&user_id, |_, subscribers| subscribers.is_empty());
        debug!(user_id, connection_id, "Connection left user channel");
    }

    /// Live connections of one user
    pub fn connection_count(&self, user_id: UserId) -> usize {
        self.users.get(&user_id).map(|s| s.len()).unwrap_or(0)
    }

    /// Live connections across all users
    pub fn total_connections(&self) -> usize {
        self.users.iter().map(|entry| entry.value().len()).sum()
    }

    /// Queue `event` on every connection of `user_id`.
    ///
    /// Delivery is at-most-once: a full queue drops the event for that
    /// connection and a closed one is unsubscribed. Returns how many
    /// connections accepted the event.
    pub fn emit(&self, user_id: UserId, event: &ServerEvent) -> usize {
        let mut delivered = 0;

        if let Some(mut subscribers) = self.users.get_mut(&user_id) {
            subscribers.retain(|s| match s.tx.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    warn!(user_id, connection_id = s.connection_id, event = event.event, "Connection queue full, dropping event");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(user_id, connection_id = s.connection_id, "Dropping closed connection");
                    false
                }
            });
        }
        self.users.remove_if(&user_id, |_, subscribers| subscribers.is_empty());

        delivered
    }
}
