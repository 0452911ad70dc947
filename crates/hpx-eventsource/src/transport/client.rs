//! Default transport backed by `reqwest`.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{AttemptSink, StreamRequest, Transport, decode::EventDecoder};
use crate::{
    error::{TransportError, TransportResult},
    message::ResponseMeta,
};

const EVENT_STREAM: &str = "text/event-stream";

/// HTTP transport for `text/event-stream` endpoints.
///
/// Holds two long-lived clients so that credentialed sessions keep their
/// cookies across reconnects while anonymous ones never store any.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    anonymous: reqwest::Client,
    credentialed: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with default client settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> TransportResult<Self> {
        let anonymous = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::config(format!("Failed to build HTTP client: {e}")))?;
        let credentialed = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            anonymous,
            credentialed,
        })
    }

    /// Use caller-provided clients, e.g. with proxies or custom TLS roots.
    pub fn with_clients(anonymous: reqwest::Client, credentialed: reqwest::Client) -> Self {
        Self {
            anonymous,
            credentialed,
        }
    }

    async fn send(&self, request: &StreamRequest) -> TransportResult<reqwest::Response> {
        let client = if request.with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        };

        let mut headers = request.headers.clone();
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static(EVENT_STREAM),
        );
        headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );

        let mut req = client
            .request(request.method.clone(), &request.url)
            .headers(headers);
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        let resp = timeout(request.connect_timeout, req.send())
            .await
            .map_err(|_| TransportError::timeout(request.connect_timeout))??;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::invalid_status(status));
        }

        let content_type = resp
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|ct| ct.to_str().ok())
            .unwrap_or("");
        if !content_type.contains(EVENT_STREAM) {
            return Err(TransportError::invalid_content_type(content_type));
        }

        Ok(resp)
    }

    async fn stream(&self, request: StreamRequest, sink: &AttemptSink) {
        let resp = match self.send(&request).await {
            Ok(resp) => resp,
            Err(err) => {
                sink.error(err);
                return;
            }
        };

        sink.open(ResponseMeta::new(resp.status(), resp.headers().clone()));

        let mut decoder = EventDecoder::new();
        let mut body = resp.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    sink.error(err.into());
                    return;
                }
            };
            match decoder.feed(&chunk) {
                Ok(messages) => messages.into_iter().for_each(|m| sink.message(m)),
                Err(err) => {
                    sink.error(err);
                    return;
                }
            }
        }

        if decoder.buffered() > 0 {
            debug!(
                attempt = %sink.attempt(),
                bytes = decoder.buffered(),
                "Discarding unterminated trailing event"
            );
        }
        sink.close();
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn run(&self, request: StreamRequest, cancel: CancellationToken, sink: AttemptSink) {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!(attempt = %sink.attempt(), url = %request.url, "Attempt cancelled");
            }
            () = self.stream(request.clone(), &sink) => {}
        }
    }
}
