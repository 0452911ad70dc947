//! Integration tests for the default HTTP transport.
//!
//! Uses a mock hyper HTTP server to emit SSE responses, verifying the full
//! request → decode → session pipeline.

use std::{collections::VecDeque, convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use hpx_eventsource::{
    CallbackObserver, ConnectionState, SessionConfig, SessionSnapshot, StreamSession,
    TransportError,
};
use http_body_util::Full;
use hyper::{
    Request, Response,
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::{net::TcpListener, sync::mpsc, time::timeout};

// ---------------------------------------------------------------------------
// Mock SSE server helpers
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct Canned {
    status: u16,
    content_type: &'static str,
    body: &'static str,
}

fn sse(body: &'static str) -> Canned {
    Canned {
        status: 200,
        content_type: "text/event-stream",
        body,
    }
}

/// What the server saw for one request.
#[derive(Clone, Debug)]
struct Seen {
    method: String,
    last_event_id: Option<String>,
    accept: Option<String>,
}

struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Seen>>>,
}

impl MockServer {
    fn url(&self) -> String {
        format!("http://{}/stream", self.addr)
    }

    fn requests(&self) -> Vec<Seen> {
        self.requests.lock().clone()
    }
}

/// Start a mock server that answers requests with `responses` in order, one
/// per request regardless of connection reuse. Once exhausted it keeps
/// repeating the last response.
async fn start_server(responses: Vec<Canned>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    let queue = Arc::new(Mutex::new(VecDeque::from(responses)));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let seen = Arc::clone(&requests);
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let queue = Arc::clone(&queue);
            let seen = Arc::clone(&seen);
            let io = TokioIo::new(stream);
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(
                        io,
                        service_fn(move |req: Request<Incoming>| {
                            let header = |name: &str| {
                                req.headers()
                                    .get(name)
                                    .and_then(|v| v.to_str().ok())
                                    .map(str::to_owned)
                            };
                            seen.lock().push(Seen {
                                method: req.method().to_string(),
                                last_event_id: header("last-event-id"),
                                accept: header("accept"),
                            });

                            let canned = {
                                let mut queue = queue.lock();
                                if queue.len() > 1 {
                                    queue.pop_front()
                                } else {
                                    queue.front().copied()
                                }
                            }
                            .expect("mock server has a response");

                            let resp = Response::builder()
                                .status(canned.status)
                                .header("content-type", canned.content_type)
                                .body(Full::new(Bytes::from(canned.body)))
                                .expect("build response");
                            async move { Ok::<_, Infallible>(resp) }
                        }),
                    )
                    .await;
            });
        }
    });

    MockServer { addr, requests }
}

/// Start a server that accepts connections but never answers.
async fn start_silent_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    addr
}

async fn wait_for(
    session: &StreamSession,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    timeout(Duration::from_secs(5), session.wait_for(predicate))
        .await
        .expect("timeout")
        .expect("session running")
}

// ---------------------------------------------------------------------------
// Event delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_events_delivered_then_clean_close() {
    let server = start_server(vec![sse(concat!(
        ": keep-alive\n",
        "id: evt-1\nevent: trade\ndata: {\"price\":42000}\n\n",
        "data: hello\ndata: world\n\n",
    ))])
    .await;

    let (close_tx, mut close_rx) = mpsc::unbounded_channel();
    let observer = CallbackObserver::new().with_close(move || {
        let _ = close_tx.send(());
    });
    let session = StreamSession::builder(SessionConfig::new(server.url()))
        .observer(observer)
        .connect()
        .expect("connect");

    timeout(Duration::from_secs(5), close_rx.recv())
        .await
        .expect("timeout")
        .expect("close observed");

    let snapshot = session.snapshot();
    assert_eq!(snapshot.connection_state, ConnectionState::Closed);
    assert_eq!(snapshot.last_event_id, "evt-1");
    assert!(snapshot.last_error.is_none());

    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].event_type(), "trade");
    assert_eq!(messages[0].data, "{\"price\":42000}");
    assert_eq!(messages[0].id.as_deref(), Some("evt-1"));
    assert_eq!(messages[1].event_type(), "message");
    assert_eq!(messages[1].data, "hello\nworld");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].accept.as_deref(), Some("text/event-stream"));
    assert_eq!(requests[0].last_event_id, None);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_non_2xx_status_is_terminal_without_retry_interval() {
    let server = start_server(vec![Canned {
        status: 403,
        content_type: "text/event-stream",
        body: "",
    }])
    .await;

    let (error_tx, mut error_rx) = mpsc::unbounded_channel();
    let observer = CallbackObserver::new().with_error(move |e| {
        let _ = error_tx.send(e.to_string());
    });
    let session = StreamSession::builder(SessionConfig::new(server.url()))
        .observer(observer)
        .connect()
        .expect("connect");

    let message = timeout(Duration::from_secs(5), error_rx.recv())
        .await
        .expect("timeout")
        .expect("error observed");
    assert!(message.contains("403"), "{message}");

    let snapshot = wait_for(&session, |s| s.last_error.is_some()).await;
    assert_eq!(snapshot.connection_state, ConnectionState::Closed);
    assert!(!snapshot.retry_pending);
    assert!(matches!(
        snapshot.last_error.as_deref(),
        Some(TransportError::InvalidStatus { status }) if status.as_u16() == 403
    ));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_invalid_content_type_is_an_error() {
    let server = start_server(vec![Canned {
        status: 200,
        content_type: "application/json",
        body: "data: test\n\n",
    }])
    .await;

    let session = StreamSession::connect(SessionConfig::new(server.url())).expect("connect");
    let snapshot = wait_for(&session, |s| s.last_error.is_some()).await;
    assert!(matches!(
        snapshot.last_error.as_deref(),
        Some(TransportError::InvalidContentType { content_type })
            if content_type == "application/json"
    ));
    assert!(session.messages().is_empty());
}

#[tokio::test]
async fn test_connect_timeout_is_an_error() {
    let addr = start_silent_server().await;
    let config = SessionConfig::new(format!("http://{addr}/stream"))
        .connect_timeout(Duration::from_millis(100));

    let session = StreamSession::connect(config).expect("connect");
    let snapshot = wait_for(&session, |s| s.last_error.is_some()).await;
    assert!(matches!(
        snapshot.last_error.as_deref(),
        Some(TransportError::Timeout { .. })
    ));
    assert_eq!(snapshot.connection_state, ConnectionState::Closed);
}

// ---------------------------------------------------------------------------
// Resumption
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_last_event_id_sent_on_reconnect_and_retry() {
    let server = start_server(vec![
        sse("id: evt-7\ndata: a\n\n"),
        Canned {
            status: 503,
            content_type: "text/plain",
            body: "unavailable",
        },
        sse("data: b\n\n"),
    ])
    .await;

    let config = SessionConfig::new(server.url())
        .method(http::Method::POST)
        .body("subscribe")
        .retry_interval(Duration::from_millis(50))
        .max_retry_interval(Duration::from_millis(200));
    let session = StreamSession::connect(config).expect("connect");

    // First response ends cleanly after one event; no automatic retry.
    wait_for(&session, |s| {
        s.messages_received == 1 && s.connection_state.is_closed()
    })
    .await;
    assert!(!session.snapshot().retry_pending);

    // Manual reconnect hits the 503, which is retried automatically.
    session.reconnect().expect("reconnect");
    let snapshot = wait_for(&session, |s| s.messages_received == 2).await;
    assert_eq!(snapshot.last_event_id, "evt-7");

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.method == "POST"));
    assert_eq!(requests[0].last_event_id, None);
    assert_eq!(requests[1].last_event_id.as_deref(), Some("evt-7"));
    assert_eq!(requests[2].last_event_id.as_deref(), Some("evt-7"));

    let messages = session.take_messages();
    assert_eq!(messages[1].data, "b");
    assert_eq!(session.history_len(), 0);
}

// ---------------------------------------------------------------------------
// Close
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_close_during_retry_stops_requests() {
    let server = start_server(vec![Canned {
        status: 500,
        content_type: "text/plain",
        body: "",
    }])
    .await;

    let config = SessionConfig::new(server.url()).retry_interval(Duration::from_millis(200));
    let session = StreamSession::connect(config).expect("connect");
    wait_for(&session, |s| s.retry_pending).await;

    session.close().expect("close");
    wait_for(&session, |s| !s.retry_pending).await;
    let count = server.requests().len();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.requests().len(), count);
    assert_eq!(session.state(), ConnectionState::Closed);
}
