//! Transport adapter seam.
//!
//! A [`Transport`] performs one long-lived request per attempt and reports
//! what happens through the four callback slots of an [`AttemptSink`]. The
//! session spawns one attempt at a time; when it supersedes or cancels an
//! attempt it fires the attempt's [`CancellationToken`], after which the
//! transport must return promptly.
//!
//! Every sink is tagged with the [`AttemptId`] it was created for. Callbacks
//! that arrive after their attempt was superseded are dropped by the session,
//! so a transport that races cancellation cannot corrupt state.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    error::TransportError,
    message::{ResponseMeta, SseMessage},
};

#[cfg(feature = "http")]
pub mod client;
#[cfg(feature = "http")]
pub mod decode;

/// Identifier of a single connection attempt within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptId(pub(crate) u64);

impl AttemptId {
    /// The raw sequence number; attempts are numbered from 1 per session.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything a transport needs to open one attempt.
#[derive(Clone, Debug)]
pub struct StreamRequest {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    pub method: http::Method,
    /// Request headers, including `Last-Event-ID` when resuming.
    pub headers: http::HeaderMap,
    /// Optional request body.
    pub body: Option<Bytes>,
    /// Send and store cookies.
    pub with_credentials: bool,
    /// Time allowed for the response headers to arrive.
    pub connect_timeout: Duration,
}

impl StreamRequest {
    /// The resumption token carried by this request, if any.
    pub fn last_event_id(&self) -> Option<&str> {
        self.headers
            .get(crate::config::LAST_EVENT_ID)
            .and_then(|value| value.to_str().ok())
    }
}

/// Callback delivered from a transport attempt to the session driver.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    Open(ResponseMeta),
    Message(SseMessage),
    Error(TransportError),
    Close,
}

/// A [`TransportEvent`] tagged with the attempt that produced it.
#[derive(Debug)]
pub(crate) struct AttemptEvent {
    pub(crate) attempt: AttemptId,
    pub(crate) event: TransportEvent,
}

/// The four callback slots handed to a transport for one attempt.
///
/// Calls never block. Once the session has moved on they are ignored.
#[derive(Clone, Debug)]
pub struct AttemptSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<AttemptEvent>,
}

impl AttemptSink {
    pub(crate) fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<AttemptEvent>) -> Self {
        Self { attempt, tx }
    }

    /// The attempt this sink reports for.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// The underlying connection opened.
    pub fn open(&self, meta: ResponseMeta) {
        self.emit(TransportEvent::Open(meta));
    }

    /// A message was decoded.
    pub fn message(&self, message: SseMessage) {
        self.emit(TransportEvent::Message(message));
    }

    /// The attempt failed.
    pub fn error(&self, error: TransportError) {
        self.emit(TransportEvent::Error(error));
    }

    /// The server ended the stream cleanly.
    pub fn close(&self) {
        self.emit(TransportEvent::Close);
    }

    fn emit(&self, event: TransportEvent) {
        // The driver is gone once the session is torn down; nothing to report to.
        let _ = self.tx.send(AttemptEvent {
            attempt: self.attempt,
            event,
        });
    }
}

/// A transport adapter that runs one streaming attempt.
///
/// Implementations report through `sink` and must stop invoking it soon after
/// `cancel` fires. Cancellation is not an error: a cancelled attempt simply
/// returns without calling `sink.error`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Run a single attempt to completion or cancellation.
    async fn run(&self, request: StreamRequest, cancel: CancellationToken, sink: AttemptSink);
}
