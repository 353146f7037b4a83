//! The stream registry: owns every live connection and the shared queue
//! their workers feed.
//!
//! ```text
//!                 ┌── worker(conn-1) ──┐
//! connect() ──►   ├── worker(conn-2) ──┼──► unbounded queue ──► events()
//!                 └── worker(conn-n) ──┘
//! ```
//!
//! The registry keeps the queue's original sender; each worker holds a
//! clone. Shutdown drops the original, so the merged stream ends exactly
//! when the last worker has posted its disconnect notification.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use chirpstream_core::oauth::OAuthSigner;
use chirpstream_core::transport::StreamOpener;
use chirpstream_core::Credentials;

use crate::config::RegistryConfig;
use crate::connection::{
    lock, ConnectionId, ConnectionShared, ConnectionState, StreamConnection,
};
use crate::description::StreamDescription;
use crate::error::RegistryError;
use crate::events::EventStream;
use crate::transport::{self, Inbound, TransportContext};

pub(crate) type ConnectionSet = Arc<Mutex<HashMap<ConnectionId, Arc<ConnectionShared>>>>;

pub(crate) struct RegistryInner {
    opener: Arc<dyn StreamOpener>,
    signer: OAuthSigner,
    config: RegistryConfig,
    connections: ConnectionSet,
    queue: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl RegistryInner {
    /// Marks the entry closing before the set's lock is released, so the
    /// worker reports `Requested` whenever this returns `true`.
    pub(crate) fn disconnect_id(&self, id: ConnectionId) -> bool {
        let mut connections = lock(&self.connections);
        match connections.remove(&id) {
            Some(shared) => {
                shared.request_close();
                drop(connections);
                tracing::info!(connection = %id, "disconnect requested");
                true
            }
            None => false,
        }
    }

    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        // Taking the sender first means a concurrent connect either
        // registered already (and is drained below) or sees no sender.
        let sender = lock(&self.queue).take();
        let drained = {
            let mut connections = lock(&self.connections);
            for shared in connections.values() {
                shared.request_close();
            }
            connections.drain().count()
        };
        tracing::info!(connections = drained, "registry shutting down");
        drop(sender);
    }
}

/// Owns a set of streaming connections and merges their events.
///
/// Independent registries do not share anything. Dropping a registry
/// shuts it down.
pub struct StreamRegistry {
    inner: Arc<RegistryInner>,
}

impl StreamRegistry {
    pub fn new(opener: Arc<dyn StreamOpener>, config: RegistryConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(RegistryInner {
                opener,
                signer: config.signer(),
                config,
                connections: Arc::new(Mutex::new(HashMap::new())),
                queue: Mutex::new(Some(tx)),
                receiver: Mutex::new(Some(rx)),
                next_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults(opener: Arc<dyn StreamOpener>) -> Self {
        Self::new(opener, RegistryConfig::default())
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Sign and open a stream for `description`, then start its worker.
    ///
    /// The connection is registered before the worker starts, so the
    /// worker's own unregistration can never be overtaken.
    pub async fn connect(
        &self,
        credentials: Credentials,
        description: StreamDescription,
    ) -> Result<StreamConnection, RegistryError> {
        if self.is_shut_down() {
            return Err(RegistryError::ShutDown);
        }
        credentials.require_token()?;

        let inner = &self.inner;
        let url = description.endpoint(&inner.config.endpoints);
        let signed = inner
            .signer
            .sign(&credentials, description.method(), &url, &description.params())?;

        let id = ConnectionId(inner.next_id.fetch_add(1, Ordering::Relaxed));
        let kind = description.kind();
        tracing::info!(connection = %id, %kind, url = %signed.url(), opener = inner.opener.name(), "connecting");

        let (close_tx, close_rx) = oneshot::channel();
        let shared = Arc::new(ConnectionShared::new(
            id,
            description,
            Arc::new(credentials),
            close_tx,
        ));

        let bytes = inner.opener.open(&signed).await.map_err(|e| {
            tracing::warn!(connection = %id, %kind, error = %e, "connect failed");
            e
        })?;

        let queue = {
            let queue = lock(&inner.queue);
            let Some(sender) = queue.as_ref() else {
                return Err(RegistryError::ShutDown);
            };
            shared.advance(ConnectionState::Open);
            lock(&inner.connections).insert(id, shared.clone());
            sender.clone()
        };

        transport::spawn(
            TransportContext {
                shared: shared.clone(),
                connections: inner.connections.clone(),
                queue,
                max_line_bytes: inner.config.max_line_bytes,
            },
            bytes,
            close_rx,
        );
        tracing::info!(connection = %id, %kind, "connected");
        Ok(StreamConnection::new(shared, Arc::downgrade(inner)))
    }

    /// The merged event stream. Can be taken once.
    pub fn events(&self) -> Result<EventStream, RegistryError> {
        lock(&self.inner.receiver)
            .take()
            .map(EventStream::new)
            .ok_or(RegistryError::EventsTaken)
    }

    /// Close `connection`. Returns `false` if it was not live.
    pub fn disconnect(&self, connection: &StreamConnection) -> bool {
        self.disconnect_id(connection.id())
    }

    pub fn disconnect_id(&self, id: ConnectionId) -> bool {
        self.inner.disconnect_id(id)
    }

    /// Close every connection and refuse new ones. Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    /// Handles to every registered connection, ordered by id.
    pub fn alive_connections(&self) -> Vec<StreamConnection> {
        let mut alive: Vec<StreamConnection> = lock(&self.inner.connections)
            .values()
            .map(|shared| StreamConnection::new(shared.clone(), Arc::downgrade(&self.inner)))
            .collect();
        alive.sort_by_key(StreamConnection::id);
        alive
    }

    pub fn connection(&self, id: ConnectionId) -> Option<StreamConnection> {
        lock(&self.inner.connections)
            .get(&id)
            .map(|shared| StreamConnection::new(shared.clone(), Arc::downgrade(&self.inner)))
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.connections).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for StreamRegistry {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("opener", &self.inner.opener.name())
            .field("connections", &self.len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
