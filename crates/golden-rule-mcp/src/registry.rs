//! Open event streams keyed by client identifier.
//!
//! All mutations go through one mutex. Removing an entry cancels its
//! lifecycle token inside the same critical section, so no task can observe
//! a connection that is cancelled but still resolvable.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("client id `{0}` is already registered")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("multiple streams are open; select one with the X-Client-Id header")]
    Ambiguous { open: usize },
    #[error("no open stream for client `{0}`")]
    UnknownClient(String),
    #[error("no stream is open")]
    NoConnections,
}

impl ResolveError {
    /// Machine-readable reason reported in the RPC error's `data`.
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Ambiguous { .. } => "ambiguous_connection",
            Self::UnknownClient(_) | Self::NoConnections => "connection_not_found",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PushError {
    #[error("stream queue is full")]
    Backlogged,
    #[error("stream is closed")]
    Closed,
}

/// Shared reference to one open stream. Cheap to clone; events pushed
/// through any clone land in the same FIFO queue, drained by a single
/// writer.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    inner: Arc<ConnectionInner>,
}

#[derive(Debug)]
struct ConnectionInner {
    id: String,
    sink: mpsc::Sender<Value>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Queues an event without waiting. Nothing is retried: an event that
    /// cannot be queued is lost.
    pub fn push(&self, event: Value) -> Result<(), PushError> {
        if self.inner.cancel.is_cancelled() {
            return Err(PushError::Closed);
        }
        self.inner.sink.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => PushError::Backlogged,
            mpsc::error::TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Resolves once the connection has been deregistered.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.inner.cancel.cancelled()
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionRegistry {
    connections: Arc<Mutex<HashMap<String, ConnectionHandle>>>,
    queue_capacity: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Stores a new connection and returns its scope guard together with the
    /// receiving end of its event queue.
    pub fn register(
        &self,
        id: impl Into<String>,
    ) -> Result<(Registration, mpsc::Receiver<Value>), RegistryError> {
        let id = id.into();
        let (sink, events) = mpsc::channel(self.queue_capacity);
        let handle = ConnectionHandle {
            inner: Arc::new(ConnectionInner {
                id: id.clone(),
                sink,
                cancel: CancellationToken::new(),
            }),
        };
        {
            let mut connections = self.connections.lock();
            if connections.contains_key(&id) {
                return Err(RegistryError::Duplicate(id));
            }
            connections.insert(id.clone(), handle.clone());
        }
        tracing::debug!(client_id = %id, "connection registered");
        Ok((
            Registration {
                registry: self.clone(),
                handle,
            },
            events,
        ))
    }

    /// Looks up `client_id`, or when absent, the only open connection.
    pub fn resolve(&self, client_id: Option<&str>) -> Result<ConnectionHandle, ResolveError> {
        let connections = self.connections.lock();
        if let Some(id) = client_id {
            return connections
                .get(id)
                .cloned()
                .ok_or_else(|| ResolveError::UnknownClient(id.to_string()));
        }
        let mut open = connections.values();
        match (open.next(), open.next()) {
            (Some(only), None) => Ok(only.clone()),
            (None, _) => Err(ResolveError::NoConnections),
            (Some(_), Some(_)) => Err(ResolveError::Ambiguous {
                open: connections.len(),
            }),
        }
    }

    /// Deregisters and cancels `client_id`. Returns whether it was present;
    /// calling it again is a no-op.
    pub fn remove(&self, client_id: &str) -> bool {
        let mut connections = self.connections.lock();
        let Some(handle) = connections.remove(client_id) else {
            return false;
        };
        handle.inner.cancel.cancel();
        drop(connections);
        tracing::debug!(client_id = %client_id, "connection deregistered");
        true
    }

    /// Stops a registered stream. The stream task observes the cancelled
    /// token and closes its response; the registry entry is already gone.
    pub fn cancel(&self, client_id: &str) -> bool {
        let removed = self.remove(client_id);
        if removed {
            tracing::info!(client_id = %client_id, "connection cancelled");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }
}

/// Keeps a connection registered for as long as it lives. Dropping it
/// deregisters the connection, on every exit path including unwinding.
#[derive(Debug)]
pub struct Registration {
    registry: ConnectionRegistry,
    handle: ConnectionHandle,
}

impl Registration {
    pub const fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.remove(self.handle.id());
    }
}
