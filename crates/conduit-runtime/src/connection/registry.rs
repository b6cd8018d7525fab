//! Routing table of open connections.

use super::{Connection, ConnectionError};
use conduit_types::ConnectionId;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Open connections by id.
///
/// A connection registers itself when opened and deregisters while
/// closing.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::AlreadyRegistered`] if its id is present.
    pub fn register(&self, connection: Connection) -> Result<(), ConnectionError> {
        let id = connection.id();
        let mut connections = self.connections.write();
        if connections.contains_key(&id) {
            return Err(ConnectionError::AlreadyRegistered { id });
        }
        connections.insert(id, connection);
        debug!(connection = %id, "connection registered");
        Ok(())
    }

    /// Removes the entry for `id`.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotRegistered`] if there is none.
    pub fn deregister(&self, id: ConnectionId) -> Result<Connection, ConnectionError> {
        let removed = self.connections.write().remove(&id);
        match removed {
            Some(connection) => {
                debug!(connection = %id, "connection deregistered");
                Ok(connection)
            }
            None => Err(ConnectionError::NotRegistered { id }),
        }
    }

    /// Looks up a connection.
    #[must_use]
    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().get(&id).cloned()
    }

    /// Registered ids.
    #[must_use]
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.read().keys().copied().collect()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Closes every registered connection with `cause`.
    ///
    /// Connections already closing are skipped.
    pub async fn close_all(&self, cause: conduit_types::Cause) {
        let open: Vec<Connection> = self.connections.read().values().cloned().collect();
        for connection in open {
            if let Err(err) = connection.close_with(cause.clone()).await {
                debug!(connection = %connection.id(), error = %err, "skipping close");
            }
        }
    }
}
