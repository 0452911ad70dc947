//! Error handling for stream sessions and transports.

use std::time::Duration;

use thiserror::Error;

/// The main result type used throughout the crate.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors surfaced by transports and by session control operations.
///
/// Every transport failure reaches the session's error observer and is kept as
/// the session's last error. Cancellation (explicit close, hidden visibility,
/// a superseding attempt) is never represented here.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request errors from the default transport.
    #[error("HTTP error: {0}")]
    Http(Box<dyn std::error::Error + Send + Sync>),

    /// The server answered with a non-success status.
    #[error("Unexpected HTTP status: {status}")]
    InvalidStatus { status: http::StatusCode },

    /// The server answered with something other than `text/event-stream`.
    #[error("Unexpected content type: {content_type}")]
    InvalidContentType { content_type: String },

    /// The event stream could not be decoded.
    #[error("Malformed event stream: {message}")]
    Decode { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Timeout errors
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The session driver has shut down and no longer accepts commands.
    #[error("Session closed: {message}")]
    SessionClosed { message: String },

    /// Errors raised by custom transports.
    #[error("Transport error: {0}")]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Create an invalid status error.
    pub fn invalid_status(status: http::StatusCode) -> Self {
        Self::InvalidStatus { status }
    }

    /// Create an invalid content type error.
    pub fn invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::InvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a session closed error.
    pub fn session_closed(message: impl Into<String>) -> Self {
        Self::SessionClosed {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error raised by a custom transport.
    pub fn custom<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Self::Custom(Box::new(error))
    }

    /// Returns `true` for errors produced by the network or the remote peer,
    /// as opposed to local misuse of the session API.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::SessionClosed { .. })
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(Box::new(error))
    }
}
