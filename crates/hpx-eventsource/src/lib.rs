//! # hpx-eventsource
//!
//! Resumable Server-Sent Events sessions.
//!
//! A [`StreamSession`] keeps one logical event stream alive across transport
//! failures. Failed attempts are retried with a deterministic exponential
//! backoff, the id of the last identified event is replayed as
//! `Last-Event-ID`, and the stream can be suspended while the consumer is
//! hidden and resumed when it becomes visible again.
//!
//! The network side is a pluggable [`Transport`]. The `http` feature (on by
//! default) provides [`HttpTransport`], built on `reqwest`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use hpx_eventsource::{CallbackObserver, ConnectionState, SessionConfig, StreamSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new("https://api.example.com/stream")
//!         .retry_interval(Duration::from_secs(1))
//!         .max_retry_interval(Duration::from_secs(30));
//!
//!     let session = StreamSession::builder(config)
//!         .observer(CallbackObserver::new().with_message(|m| println!("{}", m.data)))
//!         .connect()?;
//!
//!     session.wait_for_state(ConnectionState::Open).await?;
//!     // ...
//!     session.close()?;
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod message;
pub mod observer;
pub mod session;
pub mod transport;
pub mod visibility;

// Re-export commonly used types
pub use backoff::RetryPolicy;
pub use config::{LAST_EVENT_ID, SessionConfig};
pub use error::{TransportError, TransportResult};
pub use message::{ResponseMeta, SseMessage};
pub use observer::{CallbackObserver, NoopObserver, SessionObserver};
pub use session::{ConnectionState, SessionSnapshot, StreamSession, StreamSessionBuilder};
#[cfg(feature = "http")]
pub use transport::{client::HttpTransport, decode::EventDecoder};
pub use transport::{AttemptId, AttemptSink, StreamRequest, Transport};
pub use visibility::{Visibility, VisibilitySignal};
