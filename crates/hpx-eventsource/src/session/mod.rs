//! Stream session controller.
//!
//! A [`StreamSession`] keeps one logical SSE connection alive:
//!
//! - **Reconnection**: transport errors schedule a retry after
//!   `min(base * 2^n, cap)` where `n` counts consecutive failures. Without a
//!   retry interval the first error is terminal.
//! - **Resumption**: the id of the last identified message is replayed as
//!   `Last-Event-ID` on every subsequent attempt.
//! - **Visibility**: while the consumer is hidden the attempt is cancelled
//!   (not counted as an error); becoming visible reconnects with a fresh
//!   backoff schedule.
//!
//! # Architecture
//!
//! ```text
//! StreamSession::builder(config).connect()
//!   └─ spawns driver ──► tokio::spawn(SessionDriver::run)
//!        │                      │
//!        ├── commands ──► mpsc ─┤  (Close, Reconnect, Reconfigure, Shutdown)
//!        │                      ├─◄ AttemptSink ◄── Transport task (one at a time)
//!        │                      ├─◄ watch<Visibility>
//!        └── snapshots ◄ watch ─┘
//! ```
//!
//! Control methods enqueue a command and return immediately; their effects
//! show up in [`snapshot()`](StreamSession::snapshot) and through the observer.
//! Dropping the last clone of a session tears it down.

mod driver;
mod machine;
mod state;

use std::{fmt, sync::Arc};

use tokio::sync::{mpsc, watch};

use self::{
    driver::{SessionCommand, SessionDriver},
    state::MessageHistory,
};
pub use self::state::{ConnectionState, SessionSnapshot};
use crate::{
    config::SessionConfig,
    error::{TransportError, TransportResult},
    message::SseMessage,
    observer::{NoopObserver, SessionObserver},
    transport::Transport,
    visibility::Visibility,
};

/// Builder for a [`StreamSession`].
pub struct StreamSessionBuilder {
    config: SessionConfig,
    transport: Option<Arc<dyn Transport>>,
    observer: Arc<dyn SessionObserver>,
    visibility: Option<watch::Receiver<Visibility>>,
}

impl StreamSessionBuilder {
    /// Use a custom transport instead of the default HTTP one.
    #[must_use]
    pub fn transport(self, transport: impl Transport) -> Self {
        self.shared_transport(Arc::new(transport))
    }

    /// Use a transport shared with other sessions.
    #[must_use]
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Receive lifecycle notifications.
    #[must_use]
    pub fn observer(mut self, observer: impl SessionObserver) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Follow a visibility source. Only acted on when
    /// [`pause_on_hidden`](SessionConfig::pause_on_hidden) is set.
    #[must_use]
    pub fn visibility(mut self, visibility: watch::Receiver<Visibility>) -> Self {
        self.visibility = Some(visibility);
        self
    }

    /// Validate the configuration and start the session.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or no transport is
    /// available.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn connect(self) -> TransportResult<StreamSession> {
        self.config.validate().map_err(TransportError::config)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let history = MessageHistory::default();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let driver = SessionDriver::new(
            self.config,
            transport,
            self.observer,
            self.visibility,
            cmd_rx,
            snapshot_tx,
            history.clone(),
        );
        tokio::spawn(driver.run());

        Ok(StreamSession {
            cmd_tx,
            snapshot_rx,
            history,
        })
    }
}

impl fmt::Debug for StreamSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSessionBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("visibility", &self.visibility.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
fn default_transport() -> TransportResult<Arc<dyn Transport>> {
    Ok(Arc::new(crate::transport::client::HttpTransport::new()?))
}

#[cfg(not(feature = "http"))]
fn default_transport() -> TransportResult<Arc<dyn Transport>> {
    Err(TransportError::config(
        "No transport configured and the `http` feature is disabled",
    ))
}

/// Clone-able handle to a running stream session.
#[derive(Clone)]
pub struct StreamSession {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    history: MessageHistory,
}

impl StreamSession {
    /// Start configuring a session.
    pub fn builder(config: SessionConfig) -> StreamSessionBuilder {
        StreamSessionBuilder {
            config,
            transport: None,
            observer: Arc::new(NoopObserver),
            visibility: None,
        }
    }

    /// Start a session with the default transport and no observer.
    ///
    /// # Errors
    ///
    /// See [`StreamSessionBuilder::connect`].
    pub fn connect(config: SessionConfig) -> TransportResult<Self> {
        Self::builder(config).connect()
    }

    fn send(&self, cmd: SessionCommand) -> TransportResult<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| TransportError::session_closed("SSE session driver shut down"))
    }

    /// Cancel the active attempt and any pending retry; the session stays
    /// closed until [`reconnect`](Self::reconnect).
    ///
    /// # Errors
    ///
    /// Returns an error if the session has already shut down.
    pub fn close(&self) -> TransportResult<()> {
        self.send(SessionCommand::Close)
    }

    /// Supersede the current attempt with a fresh one.
    ///
    /// The retry counter is kept: backoff continues from where it was until a
    /// connection opens successfully.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has already shut down.
    pub fn reconnect(&self) -> TransportResult<()> {
        self.send(SessionCommand::Reconnect)
    }

    /// Swap in new options and restart with a fresh backoff schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the session has
    /// already shut down.
    pub fn reconfigure(&self, config: SessionConfig) -> TransportResult<()> {
        config.validate().map_err(TransportError::config)?;
        self.send(SessionCommand::Reconfigure(Box::new(config)))
    }

    /// Tear the session down. Further commands fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the session has already shut down.
    pub fn shutdown(&self) -> TransportResult<()> {
        self.send(SessionCommand::Shutdown)
    }

    /// Whether the driver task is still running.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.snapshot_rx.borrow().connection_state
    }

    /// Last resumption token (empty until an identified message arrives).
    pub fn last_event_id(&self) -> String {
        self.snapshot_rx.borrow().last_event_id.clone()
    }

    /// Most recent error, if any.
    pub fn last_error(&self) -> Option<Arc<TransportError>> {
        self.snapshot_rx.borrow().last_error.clone()
    }

    /// Consecutive failures since the last successful open.
    pub fn retry_count(&self) -> u32 {
        self.snapshot_rx.borrow().retry_count
    }

    /// Subscribe to snapshot updates.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session shuts down first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> TransportResult<SessionSnapshot> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| TransportError::session_closed("SSE session driver shut down"))?;
        Ok(SessionSnapshot::clone(&snapshot))
    }

    /// Wait until the session reaches `state`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session shuts down first.
    pub async fn wait_for_state(&self, state: ConnectionState) -> TransportResult<SessionSnapshot> {
        self.wait_for(|snapshot| snapshot.connection_state == state)
            .await
    }

    /// Every message received so far, oldest first.
    pub fn messages(&self) -> Vec<SseMessage> {
        self.history.to_vec()
    }

    /// Drain the message history. The history grows without bound otherwise.
    pub fn take_messages(&self) -> Vec<SseMessage> {
        self.history.take()
    }

    /// Number of messages currently held in the history.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("snapshot", &*self.snapshot_rx.borrow())
            .field("running", &self.is_running())
            .finish()
    }
}
