//! Registry behaviour against an in-memory opener.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;

use chirpstream_core::{
    ByteStream, ClassifiedEvent, Credentials, HttpMethod, SignError, SignedRequest, StreamOpener,
    TransportError,
};
use chirpstream_stream::{
    ConnectionId, ConnectionState, DisconnectReason, EventStream, RegistryConfig, RegistryError,
    StreamDescription, StreamItem, StreamKind, StreamPayload, StreamRegistry,
};

type Feed = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

/// Hands out queued results in order and records every request.
#[derive(Default)]
struct MockOpener {
    results: Mutex<VecDeque<Result<ByteStream, TransportError>>>,
    requests: Mutex<Vec<SignedRequest>>,
}

impl MockOpener {
    /// Queue a stream and return the sender that feeds it.
    fn push_stream(&self) -> Feed {
        let (tx, rx) = mpsc::unbounded();
        self.results.lock().unwrap().push_back(Ok(Box::pin(rx)));
        tx
    }

    fn push_error(&self, err: TransportError) {
        self.results.lock().unwrap().push_back(Err(err));
    }

    fn requests(&self) -> Vec<SignedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamOpener for MockOpener {
    async fn open(&self, request: &SignedRequest) -> Result<ByteStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no stream queued".into())))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn setup() -> (Arc<MockOpener>, StreamRegistry, EventStream) {
    setup_with(RegistryConfig::default())
}

fn setup_with(config: RegistryConfig) -> (Arc<MockOpener>, StreamRegistry, EventStream) {
    let opener = Arc::new(MockOpener::default());
    let registry = StreamRegistry::new(opener.clone(), config);
    let events = registry.events().unwrap();
    (opener, registry, events)
}

fn creds() -> Credentials {
    Credentials::new("CK", "CS").with_token("T", "TS")
}

fn sample() -> StreamDescription {
    StreamDescription::new(StreamKind::Sample).unwrap()
}

fn send(feed: &Feed, text: &str) {
    feed.unbounded_send(Ok(Bytes::from(text.to_string()))).unwrap();
}

fn post_line(id: u64) -> String {
    format!("{{\"id\":{id},\"text\":\"t{id}\",\"user\":{{\"screen_name\":\"a\"}}}}\r\n")
}

async fn next(events: &mut EventStream) -> StreamItem {
    tokio::time::timeout(Duration::from_secs(5), events.next())
        .await
        .expect("timed out waiting for an item")
        .expect("event stream ended")
}

#[tokio::test]
async fn lines_arrive_classified_in_wire_order() {
    let (opener, registry, mut events) = setup();
    let feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Open);

    send(&feed, "{\"text\":\"hi\",\"user\":{\"screen_name\":\"a\"},");
    send(&feed, "\"id\":1,\"created_at\":\"Mon Jan 1 00:00:00 +0000 2024\"}\r\n\r\n");
    send(&feed, "{\"delete\":{\"status\":{\"id\":42}}}\n");

    let first = next(&mut events).await;
    let Some(ClassifiedEvent::Post(post)) = first.event() else {
        panic!("expected a post, got {first:?}");
    };
    assert_eq!(post.text, "hi");
    assert_eq!(post.user.screen_name, "a");
    assert_eq!(*first.credentials, creds());
    assert_eq!(first.connection, conn.id());

    let second = next(&mut events).await;
    assert_eq!(second.event(), Some(&ClassifiedEvent::PostDeleted { id: 42 }));
    assert_eq!(second.connection, conn.id());
}

#[tokio::test]
async fn remote_close_yields_one_notification() {
    let (opener, registry, mut events) = setup();
    let feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();
    assert_eq!(registry.len(), 1);

    send(&feed, "{\"delete\":{\"status\":{\"id\":1}}}\n");
    drop(feed);

    assert!(next(&mut events).await.event().is_some());
    let last = next(&mut events).await;
    assert_eq!(last.payload, StreamPayload::Disconnected(DisconnectReason::RemoteClosed));
    assert_eq!(last.connection, conn.id());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(registry.is_empty());
    assert!(!registry.disconnect(&conn));
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn read_error_faults_the_connection() {
    let (opener, registry, mut events) = setup();
    let feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();

    feed.unbounded_send(Err(TransportError::Io("connection reset".into()))).unwrap();

    let item = next(&mut events).await;
    match item.disconnect_reason() {
        Some(DisconnectReason::Faulted(msg)) => assert!(msg.contains("connection reset")),
        other => panic!("expected a fault, got {other:?}"),
    }
    assert_eq!(conn.closed().await, ConnectionState::Faulted);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn overlong_line_faults_the_connection() {
    let config = RegistryConfig {
        max_line_bytes: 16,
        ..RegistryConfig::default()
    };
    let (opener, registry, mut events) = setup_with(config);
    let feed = opener.push_stream();
    registry.connect(creds(), sample()).await.unwrap();

    send(&feed, &"x".repeat(32));

    let item = next(&mut events).await;
    assert!(matches!(item.disconnect_reason(), Some(DisconnectReason::Faulted(_))));
}

#[tokio::test]
async fn complete_lines_before_an_overlong_tail_are_delivered() {
    let config = RegistryConfig {
        max_line_bytes: 40,
        ..RegistryConfig::default()
    };
    let (opener, registry, mut events) = setup_with(config);
    let feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();

    let chunk = format!("{{\"delete\":{{\"status\":{{\"id\":9}}}}}}\n{}", "x".repeat(64));
    send(&feed, &chunk);

    let first = next(&mut events).await;
    assert_eq!(first.event(), Some(&ClassifiedEvent::PostDeleted { id: 9 }));
    let second = next(&mut events).await;
    assert!(matches!(second.disconnect_reason(), Some(DisconnectReason::Faulted(_))));
    assert_eq!(conn.closed().await, ConnectionState::Faulted);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (opener, registry, mut events) = setup();
    let _feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();

    assert!(registry.disconnect(&conn));
    assert!(!registry.disconnect(&conn));
    assert!(!conn.close());
    assert!(!registry.disconnect_id(conn.id()));
    assert!(registry.is_empty());
    assert!(!conn.is_alive());

    let item = next(&mut events).await;
    assert_eq!(item.payload, StreamPayload::Disconnected(DisconnectReason::Requested));
    assert_eq!(conn.closed().await, ConnectionState::Closed);

    // Nothing else is queued for the closed connection.
    tokio::task::yield_now().await;
    assert!(events.try_next().is_none());
}

#[tokio::test]
async fn close_racing_a_fault_reports_requested_once() {
    let (opener, registry, mut events) = setup();
    let feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();

    assert!(conn.close());
    let _ = feed.unbounded_send(Err(TransportError::Io("reset".into())));
    drop(feed);

    let item = next(&mut events).await;
    assert_eq!(item.payload, StreamPayload::Disconnected(DisconnectReason::Requested));
    assert_eq!(conn.closed().await, ConnectionState::Closed);

    registry.shutdown();
    assert!(events.next().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn disconnect_racing_a_fault_notifies_exactly_once() {
    const CONNECTIONS: usize = 64;

    let (opener, registry, mut events) = setup();
    let registry = Arc::new(registry);
    let mut racers = Vec::new();
    for _ in 0..CONNECTIONS {
        let feed = opener.push_stream();
        let conn = registry.connect(creds(), sample()).await.unwrap();
        let fault = tokio::spawn(async move {
            let _ = feed.unbounded_send(Err(TransportError::Io("reset".into())));
        });
        let closer = {
            let registry = registry.clone();
            let id = conn.id();
            tokio::spawn(async move { registry.disconnect_id(id) })
        };
        racers.push((conn.id(), fault, closer));
    }

    let mut closed_by_caller = HashMap::new();
    for (id, fault, closer) in racers {
        fault.await.unwrap();
        closed_by_caller.insert(id, closer.await.unwrap());
    }

    let mut reasons: HashMap<ConnectionId, DisconnectReason> = HashMap::new();
    while reasons.len() < CONNECTIONS {
        let item = next(&mut events).await;
        let Some(reason) = item.disconnect_reason() else {
            panic!("unexpected {item:?}");
        };
        let previous = reasons.insert(item.connection, reason.clone());
        assert!(previous.is_none(), "second notification for {}", item.connection);
    }

    for (id, reason) in &reasons {
        if closed_by_caller[id] {
            assert_eq!(*reason, DisconnectReason::Requested, "{id}");
        } else {
            assert!(matches!(reason, DisconnectReason::Faulted(_)), "{id}: {reason}");
        }
    }

    registry.shutdown();
    let rest: Vec<StreamItem> = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .unwrap();
    assert!(rest.is_empty(), "items after the last notification: {rest:?}");
}

#[tokio::test]
async fn concurrent_connections_lose_nothing() {
    const CONNECTIONS: usize = 4;
    const LINES: u64 = 50;

    let (opener, registry, mut events) = setup();
    let feeds: Vec<Feed> = (0..CONNECTIONS).map(|_| opener.push_stream()).collect();
    let mut ids = Vec::new();
    for _ in 0..CONNECTIONS {
        ids.push(registry.connect(creds(), sample()).await.unwrap().id());
    }
    assert_eq!(registry.alive_connections().len(), CONNECTIONS);

    let writers: Vec<_> = feeds
        .into_iter()
        .map(|feed| {
            tokio::spawn(async move {
                for n in 1..=LINES {
                    send(&feed, &post_line(n));
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let mut seen: HashMap<ConnectionId, Vec<i64>> = HashMap::new();
    let mut disconnected = 0;
    while disconnected < CONNECTIONS {
        let item = next(&mut events).await;
        match item.payload {
            StreamPayload::Event(ClassifiedEvent::Post(post)) => {
                seen.entry(item.connection).or_default().push(post.id)
            }
            StreamPayload::Disconnected(reason) => {
                assert_eq!(reason, DisconnectReason::RemoteClosed);
                disconnected += 1;
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    let expected: Vec<i64> = (1..=LINES as i64).collect();
    assert_eq!(seen.len(), CONNECTIONS);
    for id in ids {
        assert_eq!(seen[&id], expected, "lines for {id} lost or reordered");
    }
    assert!(registry.is_empty());
}

#[tokio::test]
async fn shutdown_closes_everything_and_ends_the_stream() {
    let (opener, registry, events) = setup();
    let _a = opener.push_stream();
    let _b = opener.push_stream();
    let first = registry.connect(creds(), sample()).await.unwrap();
    let second = registry.connect(creds(), sample()).await.unwrap();
    assert_ne!(first.id(), second.id());

    registry.shutdown();
    registry.shutdown();
    assert!(registry.is_shut_down());
    assert!(registry.is_empty());

    let items: Vec<StreamItem> = tokio::time::timeout(Duration::from_secs(5), events.collect::<Vec<_>>())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert!(items
        .iter()
        .all(|item| item.payload == StreamPayload::Disconnected(DisconnectReason::Requested)));

    let err = registry.connect(creds(), sample()).await.unwrap_err();
    assert!(matches!(err, RegistryError::ShutDown));
}

#[tokio::test]
async fn dropping_the_registry_ends_the_stream() {
    let (opener, registry, mut events) = setup();
    let _feed = opener.push_stream();
    let conn = registry.connect(creds(), sample()).await.unwrap();
    drop(registry);

    let item = next(&mut events).await;
    assert_eq!(item.disconnect_reason(), Some(&DisconnectReason::Requested));
    assert!(events.next().await.is_none());
    assert!(!conn.close());
}

#[tokio::test]
async fn events_stay_pending_without_connections() {
    let (_opener, _registry, mut events) = setup();
    let waited = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
    assert!(waited.is_err());
}

#[tokio::test]
async fn events_can_be_taken_once() {
    let (_opener, registry, _events) = setup();
    assert!(matches!(registry.events(), Err(RegistryError::EventsTaken)));
}

#[tokio::test]
async fn connect_requires_a_token() {
    let (opener, registry, _events) = setup();
    let err = registry
        .connect(Credentials::new("CK", "CS"), sample())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Sign(SignError::MissingToken)));
    assert!(opener.requests().is_empty());
}

#[tokio::test]
async fn opener_errors_propagate() {
    let (opener, registry, _events) = setup();
    opener.push_error(TransportError::Status { status: 401, body: "Unauthorized".into() });
    let err = registry.connect(creds(), sample()).await.unwrap_err();
    assert!(matches!(err, RegistryError::Transport(TransportError::Status { status: 401, .. })));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn requests_are_routed_and_signed() {
    let (opener, registry, _events) = setup();
    let _filter = opener.push_stream();
    let _user = opener.push_stream();

    registry
        .connect(creds(), StreamDescription::track(["rust", "tokio"]).unwrap())
        .await
        .unwrap();
    registry
        .connect(creds(), StreamDescription::builder(StreamKind::User).replies_all().build().unwrap())
        .await
        .unwrap();

    let requests = opener.requests();
    assert_eq!(requests[0].method(), HttpMethod::Post);
    assert_eq!(requests[0].url(), "http://stream.twitter.com/1/statuses/filter.json");
    assert_eq!(requests[0].param("track"), Some("rust,tokio"));
    assert_eq!(requests[0].param("oauth_token"), Some("T"));
    assert!(requests[0].param("oauth_signature").is_some());

    assert_eq!(requests[1].method(), HttpMethod::Get);
    assert_eq!(requests[1].url(), "https://userstream.twitter.com/2/user.json");
    assert_eq!(requests[1].param("replies"), Some("all"));
}

#[tokio::test]
async fn delimited_streams_drop_length_prefixes() {
    let (opener, registry, mut events) = setup();
    let feed = opener.push_stream();
    let desc = StreamDescription::builder(StreamKind::Sample).delimited().build().unwrap();
    registry.connect(creds(), desc).await.unwrap();

    send(&feed, "33\r\n{\"delete\":{\"status\":{\"id\":7}}}\r\n");
    drop(feed);

    let item = next(&mut events).await;
    assert_eq!(item.event(), Some(&ClassifiedEvent::PostDeleted { id: 7 }));
    assert!(next(&mut events).await.disconnect_reason().is_some());
}

#[test]
fn blocking_iterator_for_sync_callers() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let opener = Arc::new(MockOpener::default());
    let feed = opener.push_stream();
    let registry = StreamRegistry::new(opener.clone(), RegistryConfig::default());
    let events = registry.events().unwrap();
    runtime
        .block_on(registry.connect(creds(), sample()))
        .unwrap();

    send(&feed, "{\"friends\":[1,2,3]}\n");
    drop(feed);

    let items: Vec<StreamItem> = events.blocking().take(2).collect();
    assert_eq!(
        items[0].event(),
        Some(&ClassifiedEvent::UserIdBacklog { ids: vec![1, 2, 3] })
    );
    assert_eq!(items[1].disconnect_reason(), Some(&DisconnectReason::RemoteClosed));
}
