//! Background task that drives a stream session.
//!
//! The driver is the only owner of [`SessionCore`]. It multiplexes control
//! commands, transport callbacks, the retry timer and visibility transitions in
//! one `select!` loop, so every state change happens on a single logical
//! thread and is published to handles right after it is applied.

use std::{
    future,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{mpsc, watch},
    time::{Sleep, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    machine::{ErrorOutcome, SessionCore, TimerId},
    state::{MessageHistory, SessionSnapshot},
};
use crate::{
    config::SessionConfig,
    observer::SessionObserver,
    transport::{AttemptEvent, AttemptId, AttemptSink, Transport, TransportEvent},
    visibility::Visibility,
};

/// Control commands sent from [`StreamSession`](super::StreamSession) to the driver.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    Close,
    Reconnect,
    Reconfigure(Box<SessionConfig>),
    Shutdown,
}

struct RunningAttempt {
    id: AttemptId,
    cancel: CancellationToken,
}

struct PendingRetry {
    timer: TimerId,
    sleep: Pin<Box<Sleep>>,
}

pub(crate) struct SessionDriver {
    config: SessionConfig,
    core: SessionCore,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn SessionObserver>,
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    event_tx: mpsc::UnboundedSender<AttemptEvent>,
    event_rx: mpsc::UnboundedReceiver<AttemptEvent>,
    visibility: Option<watch::Receiver<Visibility>>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    attempt: Option<RunningAttempt>,
    retry: Option<PendingRetry>,
    /// Set by an explicit `close()`; visibility changes do not revive the
    /// session until the caller reconnects.
    closed_by_caller: bool,
}

impl SessionDriver {
    pub(crate) fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn SessionObserver>,
        visibility: Option<watch::Receiver<Visibility>>,
        cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
        history: MessageHistory,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let core = SessionCore::new(config.retry_policy(), history);
        Self {
            config,
            core,
            transport,
            observer,
            cmd_rx,
            event_tx,
            event_rx,
            visibility,
            snapshot_tx,
            attempt: None,
            retry: None,
            closed_by_caller: false,
        }
    }

    /// Run until shut down or every handle is dropped.
    pub(crate) async fn run(mut self) {
        let starts_hidden = self.config.pause_on_hidden
            && self
                .visibility
                .as_mut()
                .is_some_and(|rx| rx.borrow_and_update().is_hidden());

        if starts_hidden {
            info!(url = %self.config.url, "SSE session suspended until visible");
        } else {
            let attempt = self.core.start();
            self.launch(attempt, "initial");
        }
        self.publish();

        loop {
            tokio::select! {
                biased;

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Close) => self.close(),
                        Some(SessionCommand::Reconnect) => {
                            self.closed_by_caller = false;
                            let attempt = self.core.start();
                            self.launch(attempt, "reconnect requested");
                        }
                        Some(SessionCommand::Reconfigure(config)) => self.reconfigure(*config),
                        Some(SessionCommand::Shutdown) | None => break,
                    }
                }

                Some(event) = self.event_rx.recv() => self.handle_event(event),

                timer = retry_elapsed(&mut self.retry) => self.handle_retry_due(timer),

                visibility = visibility_changed(&mut self.visibility) => {
                    self.handle_visibility(visibility);
                }
            }

            self.publish();
        }

        self.teardown();
    }

    /// Spawn the transport for `attempt`, replacing whatever was running.
    fn launch(&mut self, attempt: AttemptId, reason: &'static str) {
        self.cancel_attempt();
        self.retry = None;

        let request = self.config.build_request(self.core.last_event_id());
        info!(
            url = %self.config.url,
            attempt = %attempt,
            reason,
            last_event_id = request.last_event_id().unwrap_or_default(),
            "SSE connecting"
        );

        let cancel = CancellationToken::new();
        let sink = AttemptSink::new(attempt, self.event_tx.clone());
        let transport = Arc::clone(&self.transport);
        let token = cancel.clone();
        tokio::spawn(async move {
            transport.run(request, token, sink).await;
        });

        self.attempt = Some(RunningAttempt {
            id: attempt,
            cancel,
        });
    }

    fn cancel_attempt(&mut self) {
        if let Some(running) = self.attempt.take() {
            debug!(attempt = %running.id, "Cancelling attempt");
            running.cancel.cancel();
        }
    }

    fn close(&mut self) {
        info!(url = %self.config.url, "SSE connection closing (requested)");
        self.closed_by_caller = true;
        self.cancel_attempt();
        self.retry = None;
        self.core.close();
    }

    fn reconfigure(&mut self, config: SessionConfig) {
        info!(old_url = %self.config.url, new_url = %config.url, "SSE session reconfigured");
        self.config = config;
        self.closed_by_caller = false;
        let attempt = self.core.reconfigure(self.config.retry_policy());
        self.launch(attempt, "reconfigured");
    }

    fn handle_event(&mut self, AttemptEvent { attempt, event }: AttemptEvent) {
        match event {
            TransportEvent::Open(response) => {
                if !self.core.on_open(attempt) {
                    return ignore_stale(attempt, "open");
                }
                info!(
                    url = %self.config.url,
                    attempt = %attempt,
                    status = %response.status,
                    "SSE connection established"
                );
                self.publish();
                self.notify("on_open", |observer| observer.on_open(&response));
            }
            TransportEvent::Message(message) => {
                let observed = message.clone();
                if !self.core.on_message(attempt, message) {
                    return ignore_stale(attempt, "message");
                }
                debug!(
                    attempt = %attempt,
                    event_type = observed.event_type(),
                    id = observed.id.as_deref().unwrap_or_default(),
                    "SSE event received"
                );
                self.publish();
                self.notify("on_message", |observer| observer.on_message(&observed));
            }
            TransportEvent::Error(err) => {
                let err = Arc::new(err);
                let outcome = self.core.on_error(attempt, Arc::clone(&err));
                if outcome == ErrorOutcome::Stale {
                    return ignore_stale(attempt, "error");
                }
                self.cancel_attempt();
                error!(
                    url = %self.config.url,
                    attempt = %attempt,
                    error = %err,
                    "SSE connection failed"
                );
                self.publish();
                self.notify("on_error", |observer| observer.on_error(&err));

                if let ErrorOutcome::Retry { delay, timer } = outcome {
                    warn!(
                        retry_count = self.core.retry_count(),
                        delay_ms = millis(delay),
                        "SSE reconnecting after backoff"
                    );
                    self.retry = Some(PendingRetry {
                        timer,
                        sleep: Box::pin(sleep(delay)),
                    });
                } else {
                    warn!(url = %self.config.url, "SSE error is terminal; not retrying");
                }
            }
            TransportEvent::Close => {
                if !self.core.on_close(attempt) {
                    return ignore_stale(attempt, "close");
                }
                self.cancel_attempt();
                info!(url = %self.config.url, attempt = %attempt, "SSE stream ended");
                self.publish();
                self.notify("on_close", |observer| observer.on_close());
            }
        }
    }

    fn handle_retry_due(&mut self, timer: TimerId) {
        self.retry = None;
        if let Some(attempt) = self.core.on_retry_due(timer) {
            self.launch(attempt, "retry");
        }
    }

    fn handle_visibility(&mut self, visibility: Option<Visibility>) {
        let Some(visibility) = visibility else {
            debug!("Visibility source dropped; no longer tracking visibility");
            self.visibility = None;
            return;
        };
        if !self.config.pause_on_hidden {
            debug!(%visibility, "Ignoring visibility change (pause on hidden disabled)");
            return;
        }
        if self.closed_by_caller {
            debug!(%visibility, "Ignoring visibility change on closed session");
            return;
        }

        match visibility {
            Visibility::Hidden => {
                self.cancel_attempt();
                self.retry = None;
                if self.core.close() {
                    info!(url = %self.config.url, "SSE suspended while hidden");
                }
            }
            Visibility::Visible => {
                let attempt = self.core.resume();
                self.launch(attempt, "visible");
            }
        }
    }

    /// Invoke an observer hook. A panicking hook is logged and the session
    /// keeps running.
    fn notify(&self, hook: &'static str, f: impl FnOnce(&dyn SessionObserver)) {
        let observer = &*self.observer;
        if catch_unwind(AssertUnwindSafe(|| f(observer))).is_err() {
            error!(url = %self.config.url, hook, "SSE observer panicked");
        }
    }

    fn publish(&self) {
        let next = self.core.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn teardown(&mut self) {
        self.cancel_attempt();
        self.retry = None;
        self.core.close();
        self.visibility = None;
        self.publish();
        info!(url = %self.config.url, "SSE session shut down");
    }
}

/// Whole milliseconds in `delay`, saturating at `u64::MAX`.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

fn ignore_stale(attempt: AttemptId, callback: &'static str) {
    debug!(attempt = %attempt, callback, "Ignoring callback from superseded attempt");
}

async fn retry_elapsed(retry: &mut Option<PendingRetry>) -> TimerId {
    match retry {
        Some(pending) => {
            pending.sleep.as_mut().await;
            pending.timer
        }
        None => future::pending().await,
    }
}

async fn visibility_changed(rx: &mut Option<watch::Receiver<Visibility>>) -> Option<Visibility> {
    let Some(receiver) = rx else {
        return future::pending().await;
    };
    match receiver.changed().await {
        Ok(()) => Some(*receiver.borrow_and_update()),
        Err(_) => None,
    }
}
