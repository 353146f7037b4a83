//! Connection handles and their lifecycle.
//!
//! ```text
//! Connecting ──► Open ──┬──► Closing ──► Closed
//!                       ├──► Closed        (remote end of stream)
//!                       └──► Faulted       (read error, over-long line)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};

use chirpstream_core::Credentials;

use crate::description::StreamDescription;
use crate::registry::RegistryInner;

/// Identifier of one connection, unique within its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub(crate) u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
    Faulted,
}

impl ConnectionState {
    /// `Closed` and `Faulted` never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Faulted)
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Closed by the caller or by registry shutdown.
    Requested,
    /// The server ended the stream.
    RemoteClosed,
    /// A read failed or a line grew past the limit.
    Faulted(String),
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Requested => f.write_str("requested"),
            Self::RemoteClosed => f.write_str("remote closed"),
            Self::Faulted(msg) => write!(f, "faulted: {msg}"),
        }
    }
}

/// Lock a mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by every handle clone, the registry entry and the worker.
pub(crate) struct ConnectionShared {
    pub(crate) id: ConnectionId,
    pub(crate) description: StreamDescription,
    pub(crate) credentials: Arc<Credentials>,
    state: watch::Sender<ConnectionState>,
    closing: AtomicBool,
    close_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConnectionShared {
    pub(crate) fn new(
        id: ConnectionId,
        description: StreamDescription,
        credentials: Arc<Credentials>,
        close_tx: oneshot::Sender<()>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            id,
            description,
            credentials,
            state,
            closing: AtomicBool::new(false),
            close_tx: Mutex::new(Some(close_tx)),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Move to `next` unless already terminal. `Closing` is only entered
    /// from a live state.
    pub(crate) fn advance(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            let allowed = match next {
                ConnectionState::Closing => {
                    matches!(current, ConnectionState::Connecting | ConnectionState::Open)
                }
                _ => !current.is_terminal(),
            };
            if allowed && *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Mark closing and wake the worker. Only the first call signals.
    pub(crate) fn request_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        self.advance(ConnectionState::Closing);
        if let Some(tx) = lock(&self.close_tx).take() {
            let _ = tx.send(());
        }
    }
}

/// Handle to one live connection.
///
/// Cheap to clone. Dropping handles does not close the connection; the
/// registry owns it until [`close`](Self::close), a disconnect, or shutdown.
#[derive(Clone)]
pub struct StreamConnection {
    shared: Arc<ConnectionShared>,
    registry: Weak<RegistryInner>,
}

impl StreamConnection {
    pub(crate) fn new(shared: Arc<ConnectionShared>, registry: Weak<RegistryInner>) -> Self {
        Self { shared, registry }
    }

    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn description(&self) -> &StreamDescription {
        &self.shared.description
    }

    pub fn credentials(&self) -> &Credentials {
        &self.shared.credentials
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Returns `true` until the connection starts closing.
    pub fn is_alive(&self) -> bool {
        matches!(self.state(), ConnectionState::Connecting | ConnectionState::Open)
    }

    /// Watch state transitions.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Close this connection. Idempotent; returns `true` only for the call
    /// that actually closed it.
    pub fn close(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.disconnect_id(self.id()),
            None => {
                let was_closing = self.shared.is_closing();
                self.shared.request_close();
                !was_closing && !self.state().is_terminal()
            }
        }
    }

    /// Wait until the worker has finished and the state is terminal.
    pub async fn closed(&self) -> ConnectionState {
        let mut rx = self.state_changes();
        let state = match rx.wait_for(ConnectionState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.state(),
        };
        state
    }
}

impl std::fmt::Debug for StreamConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnection")
            .field("id", &self.id())
            .field("kind", &self.description().kind())
            .field("state", &self.state())
            .finish()
    }
}
