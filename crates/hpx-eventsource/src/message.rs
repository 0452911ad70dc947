//! Messages and response metadata delivered by transports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single decoded event from the stream.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SseMessage {
    /// Resumption identifier (`id:` field), if the event carried one.
    pub id: Option<String>,
    /// Event type (`event:` field). Absent means the default `message` type.
    pub event: Option<String>,
    /// The data payload; multiple `data:` lines are joined with `\n`.
    pub data: String,
    /// Reconnection time advertised by the server (`retry:` field).
    pub retry: Option<Duration>,
}

impl SseMessage {
    /// Create a message carrying only a data payload.
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    /// Set the resumption identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the event type.
    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// The resumption identifier, if present and non-empty.
    pub fn resumption_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// The event type, falling back to `"message"`.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }
}

/// Metadata of the HTTP response that opened a stream.
#[derive(Clone, Debug, Default)]
pub struct ResponseMeta {
    /// Response status.
    pub status: http::StatusCode,
    /// Response headers.
    pub headers: http::HeaderMap,
}

impl ResponseMeta {
    /// Create response metadata.
    pub fn new(status: http::StatusCode, headers: http::HeaderMap) -> Self {
        Self { status, headers }
    }

    /// The response `Content-Type`, if present and valid UTF-8.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}
