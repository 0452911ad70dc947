//! Stream session configuration.

use std::time::Duration;

use bytes::Bytes;

use crate::{backoff::RetryPolicy, transport::StreamRequest};

/// Header used to replay the resumption token to the server.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Configuration for a [`StreamSession`](crate::StreamSession).
///
/// Retries are disabled unless a [`retry_interval`](Self::retry_interval) is
/// set; without one the first transport error is terminal.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Stream endpoint URL.
    pub url: String,
    /// HTTP method (usually GET, some APIs use POST).
    pub method: http::Method,
    /// Additional HTTP headers to include with every request.
    pub headers: http::HeaderMap,
    /// Optional request body (for POST-based streams).
    pub body: Option<Bytes>,
    /// Send and store cookies across attempts.
    pub with_credentials: bool,
    /// Connection timeout for each attempt.
    pub connect_timeout: Duration,
    /// Base delay before the first retry (None = retries disabled).
    pub retry_interval: Option<Duration>,
    /// Maximum delay between retries (None = unbounded).
    pub max_retry_interval: Option<Duration>,
    /// Maximum consecutive automatic retries (None = unlimited).
    pub max_retries: Option<u32>,
    /// Suspend the stream while the consumer is hidden.
    pub pause_on_hidden: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            method: http::Method::GET,
            headers: http::HeaderMap::new(),
            body: None,
            with_credentials: false,
            connect_timeout: Duration::from_secs(10),
            retry_interval: None,
            max_retry_interval: None,
            max_retries: None,
            pause_on_hidden: true,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: http::Method) -> Self {
        self.method = method;
        self
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Include credentials (cookies) with every attempt.
    #[must_use]
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable automatic retries with the given base interval.
    #[must_use]
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    /// Set the maximum retry interval.
    #[must_use]
    pub fn max_retry_interval(mut self, interval: Duration) -> Self {
        self.max_retry_interval = Some(interval);
        self
    }

    /// Set the maximum number of consecutive retries.
    #[must_use]
    pub fn max_retries(mut self, retries: Option<u32>) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set whether the stream is suspended while hidden.
    #[must_use]
    pub fn pause_on_hidden(mut self, enabled: bool) -> Self {
        self.pause_on_hidden = enabled;
        self
    }

    /// The retry policy, or `None` when retries are disabled.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        self.retry_interval.map(|base| RetryPolicy {
            base,
            cap: self.max_retry_interval,
            max_retries: self.max_retries,
        })
    }

    /// Build the request for the next attempt.
    ///
    /// `last_event_id` is attached as `Last-Event-ID` when non-empty and
    /// representable as a header value.
    pub fn build_request(&self, last_event_id: &str) -> StreamRequest {
        let mut headers = self.headers.clone();
        if !last_event_id.is_empty()
            && let Ok(value) = http::HeaderValue::from_str(last_event_id)
        {
            headers.insert(http::header::HeaderName::from_static(LAST_EVENT_ID), value);
        }

        StreamRequest {
            url: self.url.clone(),
            method: self.method.clone(),
            headers,
            body: self.body.clone(),
            with_credentials: self.with_credentials,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be > 0".to_string());
        }
        if let Some(policy) = self.retry_policy() {
            policy.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.url.is_empty());
        assert_eq!(config.method, http::Method::GET);
        assert!(config.headers.is_empty());
        assert!(config.body.is_none());
        assert!(!config.with_credentials);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert!(config.retry_interval.is_none());
        assert!(config.max_retry_interval.is_none());
        assert!(config.max_retries.is_none());
        assert!(config.pause_on_hidden);
        assert!(config.retry_policy().is_none());
    }

    #[test]
    fn test_builder_pattern() {
        let config = SessionConfig::new("https://api.example.com/stream")
            .method(http::Method::POST)
            .body(&b"subscribe"[..])
            .with_credentials(true)
            .retry_interval(Duration::from_millis(500))
            .max_retry_interval(Duration::from_secs(30))
            .max_retries(Some(5))
            .pause_on_hidden(false);

        assert_eq!(config.url, "https://api.example.com/stream");
        assert_eq!(config.method, http::Method::POST);
        assert_eq!(config.body.as_deref(), Some(b"subscribe".as_slice()));
        assert!(config.with_credentials);
        assert!(!config.pause_on_hidden);
        assert_eq!(
            config.retry_policy(),
            Some(RetryPolicy {
                base: Duration::from_millis(500),
                cap: Some(Duration::from_secs(30)),
                max_retries: Some(5),
            })
        );
    }

    #[test]
    fn test_build_request_without_token() {
        let mut headers = http::HeaderMap::new();
        headers.insert("X-Api-Key", "test-key".parse().expect("valid header value"));
        let config = SessionConfig::new("https://example.com/s").headers(headers);

        let request = config.build_request("");
        assert_eq!(request.url, "https://example.com/s");
        assert!(request.headers.get(LAST_EVENT_ID).is_none());
        assert_eq!(
            request.headers.get("X-Api-Key").map(|v| v.to_str().expect("str")),
            Some("test-key")
        );
    }

    #[test]
    fn test_build_request_with_token() {
        let config = SessionConfig::new("https://example.com/s");
        let request = config.build_request("evt-42");
        assert_eq!(
            request.headers.get(LAST_EVENT_ID).map(|v| v.to_str().expect("str")),
            Some("evt-42")
        );
        // The config's own headers are untouched.
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_build_request_skips_invalid_header_value() {
        let config = SessionConfig::new("https://example.com/s");
        let request = config.build_request("bad\nid");
        assert!(request.headers.get(LAST_EVENT_ID).is_none());
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            SessionConfig::default().validate().expect_err("empty url"),
            "URL cannot be empty"
        );
        assert_eq!(
            SessionConfig::new("https://example.com")
                .connect_timeout(Duration::ZERO)
                .validate()
                .expect_err("zero timeout"),
            "Connect timeout must be > 0"
        );
        assert_eq!(
            SessionConfig::new("https://example.com")
                .retry_interval(Duration::from_secs(10))
                .max_retry_interval(Duration::from_secs(1))
                .validate()
                .expect_err("cap below base"),
            "Max retry interval must be >= retry interval"
        );
        assert!(SessionConfig::new("https://example.com").validate().is_ok());
    }

    #[test]
    fn test_cap_without_base_disables_retries() {
        let config =
            SessionConfig::new("https://example.com").max_retry_interval(Duration::from_secs(1));
        assert!(config.validate().is_ok());
        assert!(config.retry_policy().is_none());
    }
}
