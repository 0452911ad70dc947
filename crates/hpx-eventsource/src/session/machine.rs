//! Synchronous session state machine.
//!
//! `SessionCore` owns every piece of session state and decides what happens on
//! each input. It performs no I/O: the driver translates its decisions into
//! spawned attempts, cancelled tokens and armed timers. Inputs tagged with an
//! attempt or timer that is no longer current are rejected here, which is the
//! single place stale callbacks are filtered.

use std::{sync::Arc, time::Duration};

use super::state::{ConnectionState, MessageHistory, SessionSnapshot};
use crate::{
    backoff::RetryPolicy, error::TransportError, message::SseMessage, transport::AttemptId,
};

/// Identifier of a scheduled retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TimerId(u64);

/// What the driver should do after an attempt failed.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ErrorOutcome {
    /// The failing attempt had already been superseded; nothing changed.
    Stale,
    /// The error is final; no retry is scheduled.
    Terminal,
    /// Arm a timer that fires `timer` after `delay`.
    Retry { delay: Duration, timer: TimerId },
}

#[derive(Debug)]
pub(crate) struct SessionCore {
    policy: Option<RetryPolicy>,
    state: ConnectionState,
    last_event_id: String,
    retry_count: u32,
    last_error: Option<Arc<TransportError>>,
    history: MessageHistory,
    messages_received: u64,
    active_attempt: Option<AttemptId>,
    pending_retry: Option<TimerId>,
    next_id: u64,
}

impl SessionCore {
    pub(crate) fn new(policy: Option<RetryPolicy>, history: MessageHistory) -> Self {
        Self {
            policy,
            state: ConnectionState::Closed,
            last_event_id: String::new(),
            retry_count: 0,
            last_error: None,
            history,
            messages_received: 0,
            active_attempt: None,
            pending_retry: None,
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Begin a new attempt, superseding any active attempt and pending retry.
    pub(crate) fn start(&mut self) -> AttemptId {
        let attempt = AttemptId(self.next_id());
        self.pending_retry = None;
        self.active_attempt = Some(attempt);
        self.state = ConnectionState::Connecting;
        attempt
    }

    /// Return to a visible consumer: fresh backoff schedule, then connect.
    pub(crate) fn resume(&mut self) -> AttemptId {
        self.retry_count = 0;
        self.start()
    }

    /// Replace the retry policy and restart with a fresh backoff schedule.
    pub(crate) fn reconfigure(&mut self, policy: Option<RetryPolicy>) -> AttemptId {
        self.policy = policy;
        self.resume()
    }

    /// Drop the active attempt and any pending retry.
    ///
    /// Returns `true` if there was anything to cancel.
    pub(crate) fn close(&mut self) -> bool {
        let had_work = self.active_attempt.take().is_some() | self.pending_retry.take().is_some();
        self.state = ConnectionState::Closed;
        had_work
    }

    pub(crate) fn on_open(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.state = ConnectionState::Open;
        self.retry_count = 0;
        self.last_error = None;
        true
    }

    pub(crate) fn on_message(&mut self, attempt: AttemptId, message: SseMessage) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        if let Some(id) = message.resumption_id() {
            self.last_event_id = id.to_string();
        }
        self.history.push(message);
        self.messages_received += 1;
        true
    }

    /// Record a failure and decide whether to retry.
    ///
    /// The error is kept even when terminal; the driver hands the same value
    /// to the error observer.
    pub(crate) fn on_error(
        &mut self,
        attempt: AttemptId,
        error: Arc<TransportError>,
    ) -> ErrorOutcome {
        if !self.is_current(attempt) {
            return ErrorOutcome::Stale;
        }
        self.active_attempt = None;
        self.state = ConnectionState::Closed;
        self.last_error = Some(error);

        let Some(policy) = self.policy else {
            return ErrorOutcome::Terminal;
        };
        if !policy.allows(self.retry_count) {
            return ErrorOutcome::Terminal;
        }

        let delay = policy.delay(self.retry_count);
        self.retry_count = self.retry_count.saturating_add(1);
        let timer = TimerId(self.next_id());
        self.pending_retry = Some(timer);
        ErrorOutcome::Retry { delay, timer }
    }

    pub(crate) fn on_close(&mut self, attempt: AttemptId) -> bool {
        if !self.is_current(attempt) {
            return false;
        }
        self.active_attempt = None;
        self.state = ConnectionState::Closed;
        true
    }

    /// A retry timer fired. Returns the new attempt if the timer is still the
    /// pending one.
    pub(crate) fn on_retry_due(&mut self, timer: TimerId) -> Option<AttemptId> {
        if self.pending_retry != Some(timer) {
            return None;
        }
        Some(self.start())
    }

    pub(crate) fn is_current(&self, attempt: AttemptId) -> bool {
        self.active_attempt == Some(attempt)
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        self.state
    }

    pub(crate) fn last_event_id(&self) -> &str {
        &self.last_event_id
    }

    pub(crate) fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection_state: self.state,
            last_event_id: self.last_event_id.clone(),
            retry_count: self.retry_count,
            last_error: self.last_error.clone(),
            retry_pending: self.pending_retry.is_some(),
            messages_received: self.messages_received,
        }
    }
}
