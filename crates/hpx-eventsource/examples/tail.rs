//! Tail an SSE endpoint.
//!
//! Prints every event until Ctrl-C. Typing `h` + Enter hides the consumer,
//! `v` + Enter shows it again, `r` + Enter forces a reconnect.
//!
//! Run with: `RUST_LOG=hpx_eventsource=debug cargo run -p hpx-eventsource --example tail -- <url>`

use std::time::Duration;

use hpx_eventsource::{CallbackObserver, SessionConfig, StreamSession, VisibilitySignal};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let url = std::env::args().nth(1).ok_or("usage: tail <url>")?;

    let config = SessionConfig::new(url)
        .retry_interval(Duration::from_secs(1))
        .max_retry_interval(Duration::from_secs(30));

    let observer = CallbackObserver::new()
        .with_open(|response| println!("-- open ({})", response.status))
        .with_message(|message| {
            let id = message.id.as_deref().unwrap_or("-");
            println!("[{}] {} {}", message.event_type(), id, message.data);
        })
        .with_error(|error| eprintln!("-- error: {error}"))
        .with_close(|| println!("-- closed by server"));

    let visibility = VisibilitySignal::default();
    let session = StreamSession::builder(config)
        .observer(observer)
        .visibility(visibility.subscribe())
        .connect()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line?.as_deref().map(str::trim) {
                Some("h") => visibility.hide(),
                Some("v") => visibility.show(),
                Some("r") => session.reconnect()?,
                Some(_) => {}
                None => break,
            },
        }
        // Consume the history; the observer already printed everything.
        session.take_messages();
    }

    let snapshot = session.snapshot();
    println!(
        "-- {} messages, last id {:?}, state {}",
        snapshot.messages_received, snapshot.last_event_id, snapshot.connection_state
    );
    session.shutdown()?;
    Ok(())
}
