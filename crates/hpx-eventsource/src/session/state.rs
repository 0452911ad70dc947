use std::{fmt, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{error::TransportError, message::SseMessage};

/// Connection state of a stream session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    /// An attempt is in flight and has not opened yet.
    Connecting,
    /// The stream is open and delivering messages.
    Open,
    /// No attempt is active. A retry may be pending.
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns `true` if the stream is open.
    pub fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` if no attempt is active.
    pub fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Point-in-time view of a session, published after every state change.
#[derive(Clone, Debug, Default)]
pub struct SessionSnapshot {
    /// Current connection state.
    pub connection_state: ConnectionState,
    /// Last resumption token received (empty until the first identified message).
    pub last_event_id: String,
    /// Consecutive failures since the last successful open.
    pub retry_count: u32,
    /// Most recent error, cleared by a successful open.
    pub last_error: Option<Arc<TransportError>>,
    /// Whether an automatic retry is scheduled.
    pub retry_pending: bool,
    /// Total messages received over the session's lifetime.
    pub messages_received: u64,
}

impl PartialEq for SessionSnapshot {
    fn eq(&self, other: &Self) -> bool {
        let same_error = match (&self.last_error, &other.last_error) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        };
        same_error
            && self.connection_state == other.connection_state
            && self.last_event_id == other.last_event_id
            && self.retry_count == other.retry_count
            && self.retry_pending == other.retry_pending
            && self.messages_received == other.messages_received
    }
}

/// Append-only message log shared between the driver and session handles.
#[derive(Clone, Debug, Default)]
pub(crate) struct MessageHistory {
    inner: Arc<RwLock<Vec<SseMessage>>>,
}

impl MessageHistory {
    pub(crate) fn push(&self, message: SseMessage) {
        self.inner.write().push(message);
    }

    pub(crate) fn to_vec(&self) -> Vec<SseMessage> {
        self.inner.read().clone()
    }

    pub(crate) fn take(&self) -> Vec<SseMessage> {
        std::mem::take(&mut *self.inner.write())
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().len()
    }
}
