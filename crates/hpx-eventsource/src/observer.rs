//! Session observer hooks.
//!
//! Observers are invoked from the session's driver task, in the order the
//! transport reported events, and only for the attempt that is currently
//! active, after the session state has been updated and published. They must
//! not block. A panicking hook is caught and logged; the session keeps running.

use std::{fmt, sync::Arc};

use crate::{
    error::TransportError,
    message::{ResponseMeta, SseMessage},
};

/// Receives lifecycle notifications from a [`StreamSession`](crate::StreamSession).
///
/// All methods default to doing nothing.
pub trait SessionObserver: Send + Sync + 'static {
    /// The stream opened.
    fn on_open(&self, _response: &ResponseMeta) {}

    /// A message was delivered and recorded in the session history.
    fn on_message(&self, _message: &SseMessage) {}

    /// The active attempt failed.
    ///
    /// Called for every error, including those that are retried automatically.
    fn on_error(&self, _error: &TransportError) {}

    /// The server ended the stream cleanly. No retry follows.
    fn on_close(&self) {}
}

/// Observer that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

type OpenFn = Arc<dyn Fn(&ResponseMeta) + Send + Sync>;
type MessageFn = Arc<dyn Fn(&SseMessage) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&TransportError) + Send + Sync>;
type CloseFn = Arc<dyn Fn() + Send + Sync>;

/// Observer assembled from closures.
///
/// ```rust
/// use hpx_eventsource::CallbackObserver;
///
/// let observer = CallbackObserver::new()
///     .with_message(|message| println!("{}", message.data))
///     .with_error(|error| eprintln!("stream error: {error}"));
/// # let _ = observer;
/// ```
#[derive(Clone, Default)]
pub struct CallbackObserver {
    open: Option<OpenFn>,
    message: Option<MessageFn>,
    error: Option<ErrorFn>,
    close: Option<CloseFn>,
}

impl CallbackObserver {
    /// Create an observer with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the open callback.
    #[must_use]
    pub fn with_open(mut self, f: impl Fn(&ResponseMeta) + Send + Sync + 'static) -> Self {
        self.open = Some(Arc::new(f));
        self
    }

    /// Set the message callback.
    #[must_use]
    pub fn with_message(mut self, f: impl Fn(&SseMessage) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    /// Set the error callback.
    #[must_use]
    pub fn with_error(mut self, f: impl Fn(&TransportError) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    /// Set the close callback.
    #[must_use]
    pub fn with_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("open", &self.open.is_some())
            .field("message", &self.message.is_some())
            .field("error", &self.error.is_some())
            .field("close", &self.close.is_some())
            .finish()
    }
}

impl SessionObserver for CallbackObserver {
    fn on_open(&self, response: &ResponseMeta) {
        if let Some(f) = &self.open {
            f(response);
        }
    }

    fn on_message(&self, message: &SseMessage) {
        if let Some(f) = &self.message {
            f(message);
        }
    }

    fn on_error(&self, error: &TransportError) {
        if let Some(f) = &self.error {
            f(error);
        }
    }

    fn on_close(&self) {
        if let Some(f) = &self.close {
            f();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_default_hooks_do_nothing() {
        let observer = NoopObserver;
        observer.on_open(&ResponseMeta::default());
        observer.on_message(&SseMessage::new("x"));
        observer.on_error(&TransportError::decode("bad"));
        observer.on_close();
    }

    #[test]
    fn test_callback_observer_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let observer = CallbackObserver::new()
            .with_message(move |m| {
                assert_eq!(m.data, "payload");
                seen.fetch_add(1, Ordering::SeqCst);
            })
            .with_close({
                let calls = Arc::clone(&calls);
                move || {
                    calls.fetch_add(10, Ordering::SeqCst);
                }
            });

        observer.on_open(&ResponseMeta::default());
        observer.on_message(&SseMessage::new("payload"));
        observer.on_close();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert_eq!(
            format!("{observer:?}"),
            "CallbackObserver { open: false, message: true, error: false, close: true }"
        );
    }
}
