//! SSE (Server-Sent Events) record parser, encoder, and stream utilities.
//!
//! Handles buffering of partial lines and multi-line `data:` fields per the
//! [SSE specification](https://html.spec.whatwg.org/multipage/server-sent-events.html).

use std::collections::VecDeque;
use std::fmt::Display;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr_iter;

use crate::protocol::claude::ClaudeStreamEvent;

const DONE_SENTINEL: &str = "[DONE]";

/// One dispatched SSE record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    pub event: Option<String>,
    pub data: String,
}

impl SseRecord {
    /// Whether this record is the `[DONE]` end-of-stream sentinel.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.data.trim() == DONE_SENTINEL
    }
}

/// Incremental SSE line parser.
///
/// Feed it text chunks split at arbitrary boundaries and it yields
/// fully-assembled [`SseRecord`]s.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event_type: Option<String>,
    data: String,
    has_data: bool,
}

impl SseParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw text and return any complete records.
    pub fn feed(&mut self, chunk: &str) -> Vec<SseRecord> {
        let mut out = Vec::new();
        self.feed_into(chunk, &mut out);
        out
    }

    /// Feed raw text and append complete records into a caller-provided buffer.
    ///
    /// - `event:` sets the type of the next record
    /// - `data:` appends a line to the payload (one leading space stripped)
    /// - an empty line dispatches the record
    /// - `:` comments, `id:`, `retry:` and unknown fields are ignored
    pub fn feed_into(&mut self, chunk: &str, out: &mut Vec<SseRecord>) {
        self.buffer.push_str(chunk);
        let mut consumed = 0usize;
        let buffer = std::mem::take(&mut self.buffer);
        for line_end in memchr_iter(b'\n', buffer.as_bytes()) {
            let line = &buffer[consumed..line_end];
            self.process_line(line.strip_suffix('\r').unwrap_or(line), out);
            consumed = line_end + 1;
        }
        self.buffer = buffer;
        self.buffer.drain(..consumed);
    }

    /// Dispatch a trailing record that was not followed by a blank line.
    pub fn finish(&mut self) -> Option<SseRecord> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            let mut out = Vec::new();
            self.process_line(line.strip_suffix('\r').unwrap_or(&line), &mut out);
        }
        self.take_record()
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<SseRecord>) {
        if line.is_empty() {
            if let Some(record) = self.take_record() {
                out.push(record);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        if let Some(value) = line.strip_prefix("data:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            if self.has_data {
                self.data.push('\n');
            } else {
                self.has_data = true;
            }
            self.data.push_str(value);
        } else if let Some(value) = line.strip_prefix("event:") {
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.event_type = Some(value.to_string());
        }
    }

    fn take_record(&mut self) -> Option<SseRecord> {
        if !self.has_data {
            self.event_type = None;
            return None;
        }
        self.has_data = false;
        Some(SseRecord {
            event: self.event_type.take(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Split an upstream byte stream into SSE records.
///
/// Multi-byte UTF-8 sequences split across chunks are carried over; invalid
/// bytes are replaced and parsing continues. A read
/// error ends the record stream; the caller then closes its own output
/// normally.
pub fn sse_record_stream<S, E>(byte_stream: S) -> impl Stream<Item = SseRecord> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    struct State<S> {
        upstream: std::pin::Pin<Box<S>>,
        parser: SseParser,
        carry: Vec<u8>,
        pending: VecDeque<SseRecord>,
        ended: bool,
    }

    let state = State {
        upstream: Box::pin(byte_stream),
        parser: SseParser::new(),
        carry: Vec::new(),
        pending: VecDeque::new(),
        ended: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(record) = state.pending.pop_front() {
                return Some((record, state));
            }
            if state.ended {
                return None;
            }
            match state.upstream.as_mut().next().await {
                Some(Ok(bytes)) => {
                    state.carry.extend_from_slice(&bytes);
                    let mut parsed = Vec::new();
                    feed_utf8(&mut state.carry, &mut state.parser, &mut parsed);
                    state.pending.extend(parsed);
                }
                Some(Err(err)) => {
                    tracing::warn!("upstream stream read failed: {err}");
                    state.ended = true;
                }
                None => {
                    state.ended = true;
                    if !state.carry.is_empty() {
                        let tail = String::from_utf8_lossy(&state.carry).into_owned();
                        state.carry.clear();
                        let mut parsed = Vec::new();
                        state.parser.feed_into(&tail, &mut parsed);
                        state.pending.extend(parsed);
                    }
                    if let Some(record) = state.parser.finish() {
                        state.pending.push_back(record);
                    }
                }
            }
        }
    })
}

/// Feed the decodable prefix of `carry` to the parser. Invalid sequences are
/// replaced with U+FFFD; only a sequence cut off at the chunk end stays behind.
fn feed_utf8(carry: &mut Vec<u8>, parser: &mut SseParser, out: &mut Vec<SseRecord>) {
    let mut start = 0;
    while start < carry.len() {
        match std::str::from_utf8(&carry[start..]) {
            Ok(text) => {
                parser.feed_into(text, out);
                start = carry.len();
            }
            Err(err) => {
                let valid = start + err.valid_up_to();
                if let Ok(text) = std::str::from_utf8(&carry[start..valid]) {
                    parser.feed_into(text, out);
                }
                let Some(invalid) = err.error_len() else {
                    start = valid;
                    break;
                };
                tracing::trace!(bytes = invalid, "replacing invalid UTF-8 in upstream stream");
                parser.feed_into("\u{FFFD}", out);
                start = valid + invalid;
            }
        }
    }
    carry.drain(..start);
}

/// Format a named SSE frame.
#[must_use]
pub fn named_sse_frame(event_type: &str, json: &str) -> String {
    let mut out = String::with_capacity(18 + event_type.len() + json.len());
    out.push_str("event: ");
    out.push_str(event_type);
    out.push('\n');
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Encode a Claude stream event as an SSE frame.
#[must_use]
pub fn encode_claude_event(event: &ClaudeStreamEvent) -> Option<Bytes> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Bytes::from(named_sse_frame(event.event_name(), &json))),
        Err(err) => {
            tracing::warn!("failed to encode {} event: {err}", event.event_name());
            None
        }
    }
}
