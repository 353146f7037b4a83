//! The merged, lazily classified event stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;

use chirpstream_core::{classify_line, ClassifiedEvent, Credentials};

use crate::connection::{ConnectionId, DisconnectReason};
use crate::transport::Inbound;

/// What happened on a connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StreamPayload {
    Event(ClassifiedEvent),
    /// Always the last item for its connection.
    Disconnected(DisconnectReason),
}

/// One item of the merged stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamItem {
    pub connection: ConnectionId,
    #[serde(skip)]
    pub credentials: Arc<Credentials>,
    #[serde(flatten)]
    pub payload: StreamPayload,
}

impl StreamItem {
    pub fn event(&self) -> Option<&ClassifiedEvent> {
        match &self.payload {
            StreamPayload::Event(event) => Some(event),
            StreamPayload::Disconnected(_) => None,
        }
    }

    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        match &self.payload {
            StreamPayload::Disconnected(reason) => Some(reason),
            StreamPayload::Event(_) => None,
        }
    }

    fn from_inbound(inbound: Inbound) -> Self {
        match inbound {
            Inbound::Line(line) => Self {
                connection: line.connection,
                payload: StreamPayload::Event(classify_line(&line.text)),
                credentials: line.credentials,
            },
            Inbound::Disconnected { connection, credentials, reason } => Self {
                connection,
                credentials,
                payload: StreamPayload::Disconnected(reason),
            },
        }
    }
}

/// Events from every connection of one registry, classified as they are
/// pulled.
///
/// Stays pending while the registry is alive, even with no connections.
/// Ends once the registry is shut down and every worker has exited.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

impl EventStream {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Inbound>) -> Self {
        Self { rx }
    }

    /// Next item if one is already queued.
    pub fn try_next(&mut self) -> Option<StreamItem> {
        self.rx.try_recv().ok().map(StreamItem::from_inbound)
    }

    /// Adapt to a blocking iterator for synchronous callers.
    ///
    /// Must not be used from inside an async task; the workers need a
    /// runtime that keeps running while the caller blocks.
    pub fn blocking(self) -> BlockingEvents {
        BlockingEvents {
            inner: futures::executor::block_on_stream(self),
        }
    }
}

impl Stream for EventStream {
    type Item = StreamItem;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamItem>> {
        self.rx
            .poll_recv(cx)
            .map(|item| item.map(StreamItem::from_inbound))
    }
}

/// Blocking iterator over an [`EventStream`].
pub struct BlockingEvents {
    inner: futures::executor::BlockingStream<EventStream>,
}

impl Iterator for BlockingEvents {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        self.inner.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawLine;
    use futures::StreamExt;

    fn creds() -> Arc<Credentials> {
        Arc::new(Credentials::new("CK", "CS").with_token("T", "TS"))
    }

    #[tokio::test]
    async fn lines_are_classified_on_pull() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = EventStream::new(rx);
        tx.send(Inbound::Line(RawLine {
            connection: ConnectionId(1),
            credentials: creds(),
            text: r#"{"delete":{"status":{"id":42}}}"#.into(),
        }))
        .unwrap();
        tx.send(Inbound::Disconnected {
            connection: ConnectionId(1),
            credentials: creds(),
            reason: DisconnectReason::RemoteClosed,
        })
        .unwrap();
        drop(tx);

        let first = events.next().await.unwrap();
        assert_eq!(first.event(), Some(&ClassifiedEvent::PostDeleted { id: 42 }));
        let second = events.next().await.unwrap();
        assert_eq!(second.disconnect_reason(), Some(&DisconnectReason::RemoteClosed));
        assert!(events.next().await.is_none());
    }

    #[test]
    fn try_next_does_not_block() {
        let (tx, rx) = mpsc::unbounded_channel::<Inbound>();
        let mut events = EventStream::new(rx);
        assert!(events.try_next().is_none());
        drop(tx);
        assert!(events.try_next().is_none());
    }

    #[test]
    fn items_serialize_flat() {
        let item = StreamItem {
            connection: ConnectionId(3),
            credentials: creds(),
            payload: StreamPayload::Event(ClassifiedEvent::PostDeleted { id: 1 }),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "connection": 3,
                "type": "event",
                "payload": {"kind": "post_deleted", "data": {"id": 1}}
            })
        );
    }
}
