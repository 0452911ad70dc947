//! Incremental decoder for the `text/event-stream` format.
//!
//! Follows the interpretation rules of the
//! [HTML Living Standard](https://html.spec.whatwg.org/multipage/server-sent-events.html#event-stream-interpretation):
//! lines end in LF, CR or CRLF; a leading BOM is skipped; lines starting with
//! `:` are comments; a blank line dispatches the pending event. Events without
//! any `data:` line are not dispatched, but an `id:` they carry is attached to
//! the next dispatched event.

use std::time::Duration;

use bytes::{Buf, BytesMut};

use crate::{
    error::{TransportError, TransportResult},
    message::SseMessage,
};

const LF: u8 = b'\n';
const CR: u8 = b'\r';
const BOM: &[u8] = "\u{FEFF}".as_bytes();

/// Push-based decoder: feed body chunks, collect complete messages.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: BytesMut,
    pending: PendingEvent,
    carried_id: Option<String>,
    started: bool,
}

#[derive(Debug, Default)]
struct PendingEvent {
    event: Option<String>,
    data: Option<String>,
    id: Option<String>,
    retry: Option<Duration>,
}

impl EventDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every message completed by it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Decode`] if a line is not valid UTF-8. The
    /// decoder should be discarded afterwards.
    pub fn feed(&mut self, chunk: &[u8]) -> TransportResult<Vec<SseMessage>> {
        self.buffer.extend_from_slice(chunk);

        if !self.started {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Ok(Vec::new());
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.advance(BOM.len());
            }
            self.started = true;
        }

        let mut messages = Vec::new();
        while let Some((line_end, rem_start)) = find_eol(&self.buffer) {
            let line = self.buffer.split_to(line_end).freeze();
            self.buffer.advance(rem_start - line_end);

            if line.is_empty() {
                if let Some(message) = self.dispatch() {
                    messages.push(message);
                }
            } else {
                self.apply_line(&line)?;
            }
        }
        Ok(messages)
    }

    /// Bytes buffered but not yet terminated by a line ending.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn apply_line(&mut self, line: &[u8]) -> TransportResult<()> {
        let (name, value) = match memchr::memchr(b':', line) {
            Some(0) => return Ok(()),
            Some(colon) => {
                let value = &line[colon + 1..];
                let value = value.strip_prefix(b" ").unwrap_or(value);
                (&line[..colon], value)
            }
            None => (line, &b""[..]),
        };

        let value = std::str::from_utf8(value)
            .map_err(|e| TransportError::decode(format!("invalid UTF-8 in field: {e}")))?;

        match name {
            b"event" => {
                self.pending.event = (!value.is_empty()).then(|| value.to_string());
            }
            b"data" => match &mut self.pending.data {
                Some(data) => {
                    data.push('\n');
                    data.push_str(value);
                }
                None => self.pending.data = Some(value.to_string()),
            },
            b"id" => {
                if !value.contains('\0') {
                    self.pending.id = Some(value.to_string());
                }
            }
            b"retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse::<u64>()
                {
                    self.pending.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn dispatch(&mut self) -> Option<SseMessage> {
        let PendingEvent {
            event,
            data,
            id,
            retry,
        } = std::mem::take(&mut self.pending);

        let Some(data) = data else {
            if id.is_some() {
                self.carried_id = id;
            }
            return None;
        };

        let id = id.or_else(|| self.carried_id.take());
        self.carried_id = None;

        Some(SseMessage {
            id,
            event,
            data,
            retry,
        })
    }
}

/// Finds the next end-of-line in `bytes`.
///
/// Returns `(line_end, remainder_start)`, or `None` if more data is needed. A
/// trailing lone CR waits for the next chunk since it may start a CRLF pair.
fn find_eol(bytes: &[u8]) -> Option<(usize, usize)> {
    let pos = memchr::memchr2(CR, LF, bytes)?;
    if bytes[pos] == LF {
        return Some((pos, pos + 1));
    }
    match bytes.get(pos + 1) {
        None => None,
        Some(&LF) => Some((pos, pos + 2)),
        Some(_) => Some((pos, pos + 1)),
    }
}
