//! Stream adapter that turns an HTTP body into Server-Sent Events.
//!
//! Both providers answer `stream=true` calls with `text/event-stream` bodies.
//! Gemini frames events with `\r\n\r\n`, OpenAI-compatible servers with
//! `\n\n`, so carriage returns are dropped as bytes arrive and events are
//! split on blank lines only. Lone-CR line endings are not supported.

use futures_util::{Stream, StreamExt};
use memchr::memmem;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::trace;

use crate::Error;

/// Upper bound for bytes buffered while waiting for an event terminator.
const MAX_BUFFERED_BYTES: usize = 1_000_000;

/// A Server-Sent Events (SSE) event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// Event type (optional).
    pub event_type: Option<String>,
    /// Event data, multiple `data:` lines joined with `\n`.
    pub data: String,
}

impl SseEvent {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            event_type: None,
            data: data.into(),
        }
    }

    /// Check if this is the `[DONE]` sentinel OpenAI-compatible servers send last.
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }

    fn parse(event_text: &str) -> Option<SseEvent> {
        let mut event_type = None;
        let mut data_lines = Vec::new();

        for line in event_text.lines() {
            // Blank lines and `:` comments (keep-alives) carry nothing.
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };

            match field {
                "event" => event_type = Some(value.to_string()),
                "data" => data_lines.push(value),
                _ => {}
            }
        }

        if data_lines.is_empty() {
            return None;
        }

        Some(SseEvent {
            event_type,
            data: data_lines.join("\n"),
        })
    }
}

/// Parses SSE events out of a byte stream, carrying partial events (and
/// partial UTF-8 sequences) across chunk boundaries.
pub struct SseStream<S> {
    inner: S,
    buffer: Vec<u8>,
    events: VecDeque<SseEvent>,
    /// Reported once the events parsed before it have been handed out.
    pending_error: Option<Error>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            events: VecDeque::new(),
            pending_error: None,
            finished: false,
        }
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer
            .extend(chunk.iter().copied().filter(|&byte| byte != b'\r'));
    }

    /// Move every complete event in the buffer into the ready queue.
    fn drain_events(&mut self) -> Result<(), Error> {
        let finder = memmem::Finder::new(b"\n\n");
        let mut start = 0;

        while let Some(pos) = finder.find(&self.buffer[start..]) {
            let end = start + pos;
            let text = std::str::from_utf8(&self.buffer[start..end])
                .map_err(|e| Error::streaming(format!("Invalid UTF-8 in SSE event: {e}")))?;

            if let Some(event) = SseEvent::parse(text) {
                trace!(bytes = text.len(), "sse event parsed");
                self.events.push_back(event);
            }
            start = end + 2;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        Ok(())
    }

    /// Parse whatever is left once the body ends without a final blank line.
    fn take_trailing_event(&mut self) -> Option<SseEvent> {
        let trailing = std::mem::take(&mut self.buffer);
        let text = std::str::from_utf8(&trailing).ok()?.trim();
        if text.is_empty() {
            return None;
        }
        SseEvent::parse(text)
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(event) = self.events.pop_front() {
                return Poll::Ready(Some(Ok(event)));
            }
            if let Some(e) = self.pending_error.take() {
                return Poll::Ready(Some(Err(e)));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => {
                    self.push_chunk(&chunk);
                    if let Err(e) = self.drain_events() {
                        self.finished = true;
                        self.pending_error = Some(e);
                        continue;
                    }
                    // Only the unterminated tail counts against the limit.
                    if self.buffer.len() > MAX_BUFFERED_BYTES {
                        self.buffer.clear();
                        self.finished = true;
                        self.pending_error =
                            Some(Error::streaming("SSE buffer exceeded maximum size"));
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(Error::streaming(format!(
                        "Stream error: {e}"
                    )))));
                }
                None => {
                    self.finished = true;
                    if let Some(event) = self.take_trailing_event() {
                        return Poll::Ready(Some(Ok(event)));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }
}

impl<S: Stream> SseStreamExt for S {}
