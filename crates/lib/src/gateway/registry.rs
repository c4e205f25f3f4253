//! Connection registry: register and lookup open connections by id.
//!
//! Each WebSocket task registers the sending half of its outbound channel here;
//! the room manager delivers events through [`ConnectionRegistry::send`].
//! Delivery is fire-and-forget: a missing or closed connection is an expected
//! race (the peer may have already disconnected), never an error.

use crate::gateway::protocol::{ConnectionId, ServerEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// Registry of connection ids to outbound event senders. Shared across the gateway.
pub struct ConnectionRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a freshly accepted connection.
    pub async fn register(&self, id: ConnectionId, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.inner.write().await.insert(id, tx);
    }

    /// Remove a connection when its transport closes.
    pub async fn unregister(&self, id: &str) {
        self.inner.write().await.remove(id);
    }

    /// Deliver an event to one connection; silently drops when the connection
    /// no longer exists or its socket task has exited.
    pub async fn send(&self, id: &str, event: ServerEvent) {
        let g = self.inner.read().await;
        if let Some(tx) = g.get(id) {
            let _ = tx.send(event);
        }
    }

    /// Number of currently open connections.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
