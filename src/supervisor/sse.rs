//! Server-Sent Events transport
//!
//! Decodes a `text/event-stream` body into events. Only unnamed (`message`)
//! events become frames; comment lines such as `: keepalive` and named events
//! are dropped here.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use futures::{stream, Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use tracing::debug;

use super::transport::{FrameStream, Transport};
use crate::error::{Result, StreamError};

/// Default event type when no `event:` field is given
pub const DEFAULT_EVENT: &str = "message";

/// Longest line the decoder buffers before failing the stream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// One decoded SSE event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type
    pub event: String,
    /// Event data, multi-line data joined with `\n`
    pub data: String,
    /// Last event id, if any
    pub id: Option<String>,
}

impl SseEvent {
    /// Create an unnamed event
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(DEFAULT_EVENT, data)
    }

    /// Create an event
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
            id: None,
        }
    }

    /// Whether this is an unnamed `message` event
    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT
    }
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence; only
/// complete lines are decoded. `retry:` fields are ignored, reconnect timing
/// belongs to the supervisor's backoff.
#[derive(Debug)]
pub struct SseDecoder {
    buf: BytesMut,
    max_line: usize,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    /// Create a decoder with the default line cap
    pub fn new() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }

    /// Create a decoder that fails once a line exceeds `max_line` bytes
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_line,
            data: Vec::new(),
            event: None,
            last_id: None,
        }
    }

    /// Feed a chunk, returning every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            if pos > self.max_line {
                return Err(self.overflow());
            }
            let line = self.buf.split_to(pos);
            self.buf.advance(1);

            let line = String::from_utf8_lossy(&line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }

        if self.buf.len() > self.max_line {
            return Err(self.overflow());
        }
        Ok(events)
    }

    fn overflow(&mut self) -> StreamError {
        self.buf.clear();
        self.data.clear();
        self.event = None;
        StreamError::transport(format!("SSE line exceeds {} bytes", self.max_line))
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_id.clone(),
        })
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

/// SSE transport over reqwest
#[derive(Clone)]
pub struct SseTransport {
    client: Client,
}

impl SseTransport {
    /// Create a transport with a fresh HTTP client
    pub fn new() -> Result<Self> {
        // No overall timeout: the response body is the live stream.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| StreamError::transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Create a transport sharing an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn open(&self, endpoint: &str) -> Result<FrameStream> {
        let response = self
            .client
            .get(endpoint)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?
            .error_for_status()?;

        debug!(endpoint = %endpoint, status = %response.status(), "SSE stream opened");

        let body: ByteStream = Box::pin(response.bytes_stream());
        let frames = stream::unfold(
            (body, SseDecoder::new(), VecDeque::new()),
            |(mut body, mut decoder, mut pending)| async move {
                loop {
                    if let Some(frame) = pending.pop_front() {
                        return Some((Ok(frame), (body, decoder, pending)));
                    }

                    match body.next().await {
                        Some(Ok(chunk)) => match decoder.feed(&chunk) {
                            Ok(events) => pending.extend(
                                events
                                    .into_iter()
                                    .filter(SseEvent::is_message)
                                    .map(|event| event.data),
                            ),
                            Err(e) => return Some((Err(e), (body, decoder, pending))),
                        },
                        Some(Err(e)) => {
                            return Some((Err(StreamError::from(e)), (body, decoder, pending)))
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(frames))
    }

    fn name(&self) -> &str {
        "sse"
    }
}
