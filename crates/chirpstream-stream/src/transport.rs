//! The per-connection worker that turns a byte stream into queued lines.
//!
//! Each open connection gets one tokio task. The task races the connection's
//! close signal against the next chunk, splits chunks into lines and pushes
//! them into the registry's shared queue. Whatever ends the loop, the task
//! drops the byte stream, unregisters the connection and enqueues exactly one
//! disconnect notification.

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use chirpstream_core::transport::ByteStream;
use chirpstream_core::Credentials;

use crate::connection::{lock, ConnectionId, ConnectionShared, ConnectionState, DisconnectReason};
use crate::registry::ConnectionSet;

/// One undecoded line, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct RawLine {
    pub connection: ConnectionId,
    pub credentials: Arc<Credentials>,
    pub text: String,
}

/// What workers push into the shared queue.
#[derive(Debug)]
pub(crate) enum Inbound {
    Line(RawLine),
    Disconnected {
        connection: ConnectionId,
        credentials: Arc<Credentials>,
        reason: DisconnectReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineFault {
    #[error("line exceeds {limit} bytes")]
    TooLong { limit: usize },
}

/// Splits a chunked byte stream into lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped. Blank lines are
/// keep-alives and are dropped. With length-prefix framing, lines holding
/// only digits are the prefixes and are dropped too.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    /// Prefix of `pending` already known to hold no `\n`.
    scanned: usize,
    max_line_bytes: usize,
    delimited: bool,
}

impl LineBuffer {
    pub fn new(max_line_bytes: usize, delimited: bool) -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
            max_line_bytes,
            delimited,
        }
    }

    /// Feed one chunk and collect every line it completes.
    ///
    /// On a fault the lines completed before the offending one are still
    /// returned, in order, alongside it.
    pub fn push(&mut self, chunk: &[u8]) -> (Vec<String>, Option<LineFault>) {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut search = self.scanned;
        while let Some(offset) = self.pending[search..].iter().position(|&b| b == b'\n') {
            let end = search + offset;
            let line = &self.pending[start..end];
            if line.len() > self.max_line_bytes {
                return (lines, Some(LineFault::TooLong { limit: self.max_line_bytes }));
            }
            if let Some(text) = self.keep(line) {
                lines.push(text);
            }
            start = end + 1;
            search = start;
        }
        self.pending.drain(..start);
        self.scanned = self.pending.len();
        if self.pending.len() > self.max_line_bytes {
            return (lines, Some(LineFault::TooLong { limit: self.max_line_bytes }));
        }
        (lines, None)
    }

    /// The unterminated tail left when the stream ends, if it is a line
    /// worth keeping.
    pub fn finish(&mut self) -> Option<String> {
        let tail = std::mem::take(&mut self.pending);
        self.scanned = 0;
        self.keep(&tail)
    }

    fn keep(&self, line: &[u8]) -> Option<String> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let text = String::from_utf8_lossy(line);
        let trimmed = text.trim();
        if trimmed.is_empty() {
            tracing::trace!("keep-alive");
            return None;
        }
        if self.delimited && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(text.into_owned())
    }
}

/// Everything a worker needs besides the byte stream itself.
pub(crate) struct TransportContext {
    pub(crate) shared: Arc<ConnectionShared>,
    pub(crate) connections: ConnectionSet,
    pub(crate) queue: mpsc::UnboundedSender<Inbound>,
    pub(crate) max_line_bytes: usize,
}

/// Spawn the worker for one connection.
pub(crate) fn spawn(
    ctx: TransportContext,
    bytes: ByteStream,
    close_rx: oneshot::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(run(ctx, bytes, close_rx))
}

async fn run(ctx: TransportContext, mut bytes: ByteStream, mut close_rx: oneshot::Receiver<()>) {
    let id = ctx.shared.id;
    let credentials = ctx.shared.credentials.clone();
    let mut buffer = LineBuffer::new(ctx.max_line_bytes, ctx.shared.description.is_delimited());
    let push = |text: String| {
        tracing::trace!(connection = %id, line = %text, "line");
        let _ = ctx.queue.send(Inbound::Line(RawLine {
            connection: id,
            credentials: credentials.clone(),
            text,
        }));
    };

    let reason = loop {
        tokio::select! {
            biased;
            _ = &mut close_rx => break DisconnectReason::Requested,
            chunk = bytes.next() => match chunk {
                Some(Ok(chunk)) => {
                    let (lines, fault) = buffer.push(&chunk);
                    lines.into_iter().for_each(&push);
                    if let Some(fault) = fault {
                        break DisconnectReason::Faulted(fault.to_string());
                    }
                }
                Some(Err(e)) => break DisconnectReason::Faulted(e.to_string()),
                None => {
                    if let Some(tail) = buffer.finish() {
                        push(tail);
                    }
                    break DisconnectReason::RemoteClosed;
                }
            },
        }
    };
    drop(bytes);

    // Unregister and read the closing flag under the set's lock: a
    // disconnect that found the entry has already marked it closing, and
    // anything that surfaced after a close request is part of the close.
    let requested = {
        let mut connections = lock(&ctx.connections);
        connections.remove(&id);
        ctx.shared.is_closing()
    };
    let reason = if requested { DisconnectReason::Requested } else { reason };

    match &reason {
        DisconnectReason::Faulted(msg) => {
            tracing::warn!(connection = %id, error = %msg, "connection faulted");
            ctx.shared.advance(ConnectionState::Faulted);
        }
        reason => {
            tracing::info!(connection = %id, %reason, "connection closed");
            ctx.shared.advance(ConnectionState::Closed);
        }
    }
    let _ = ctx.queue.send(Inbound::Disconnected {
        connection: id,
        credentials,
        reason,
    });
}
