//! Protocol-agnostic SSE envelope: turns upstream records into a bracketed
//! Claude event stream by driving a per-dialect [`DeltaDecoder`].

use std::fmt::Display;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use smallvec::SmallVec;

use super::sse::{encode_claude_event, sse_record_stream};
use super::{BlockCursor, DecodeOutcome, DeltaDecoder};
use crate::protocol::claude::{ClaudeMessageStart, ClaudeStreamEvent};
use crate::util::next_message_id;

/// Envelope state for one streamed response.
///
/// Owns the decoder and the output block cursor; dropping the driver drops
/// every piece of per-response scratch state.
pub struct EnvelopeDriver {
    decoder: Box<dyn DeltaDecoder>,
    cursor: BlockCursor,
    message_id: String,
    started: bool,
    closed: bool,
}

#[derive(Deserialize)]
struct ModelProbe {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    response: Option<Box<ModelProbe>>,
}

impl ModelProbe {
    fn find(payload: &str) -> Option<String> {
        let probe: ModelProbe = serde_json::from_str(payload).ok()?;
        probe
            .model
            .or_else(|| probe.response.and_then(|inner| inner.model))
    }
}

impl EnvelopeDriver {
    #[must_use]
    pub fn new(decoder: Box<dyn DeltaDecoder>) -> Self {
        Self {
            decoder,
            cursor: BlockCursor::default(),
            message_id: next_message_id(),
            started: false,
            closed: false,
        }
    }

    #[must_use]
    pub fn cursor(&self) -> BlockCursor {
        self.cursor
    }

    /// Handle one upstream record payload and return the client events it produced.
    pub fn on_record(&mut self, payload: &str) -> Vec<ClaudeStreamEvent> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        if !self.started {
            out.push(self.message_start(ModelProbe::find(payload)));
        }
        match self.decoder.decode(payload, self.cursor) {
            DecodeOutcome::NoEffect => {}
            DecodeOutcome::Emit { events, cursor } => {
                self.cursor = cursor;
                out.extend(events);
            }
        }
        out
    }

    /// Close the envelope: flush the decoder, then `message_delta` and `message_stop`.
    pub fn close(&mut self) -> Vec<ClaudeStreamEvent> {
        let mut out = Vec::new();
        if self.closed {
            return out;
        }
        self.closed = true;
        if !self.started {
            out.push(self.message_start(None));
        }
        let end = self.decoder.finish(self.cursor);
        tracing::debug!(
            stop_reason = ?end.stop_reason,
            usage = ?end.usage,
            blocks = self.cursor.next_index(),
            "client stream closed"
        );
        out.extend(end.events);
        out.push(ClaudeStreamEvent::stop_reason(end.stop_reason, end.usage));
        out.push(ClaudeStreamEvent::MessageStop {});
        out
    }

    fn message_start(&mut self, model: Option<String>) -> ClaudeStreamEvent {
        self.started = true;
        ClaudeStreamEvent::MessageStart {
            message: ClaudeMessageStart::new(self.message_id.clone(), model.unwrap_or_default()),
        }
    }
}

/// Frames produced by one record; most records yield one or two.
type FrameBatch = SmallVec<[Bytes; 4]>;

fn encode_all(events: Vec<ClaudeStreamEvent>) -> FrameBatch {
    events.iter().filter_map(encode_claude_event).collect()
}

/// Translate an upstream SSE body into a Claude SSE body.
///
/// Stops at the `[DONE]` sentinel or upstream end, whichever comes first.
/// Every record is forwarded as soon as it is decoded.
pub fn drive_sse<S, E>(
    upstream: S,
    decoder: Box<dyn DeltaDecoder>,
) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let records = Box::pin(sse_record_stream(upstream));
    let driver = EnvelopeDriver::new(decoder);

    futures_util::stream::unfold(Some((records, driver)), |state| async move {
        let (mut records, mut driver) = state?;
        loop {
            match records.next().await {
                Some(record) if !record.is_done() => {
                    let frames = encode_all(driver.on_record(&record.data));
                    if !frames.is_empty() {
                        return Some((frames, Some((records, driver))));
                    }
                }
                _ => {
                    let frames = encode_all(driver.close());
                    return Some((frames, None));
                }
            }
        }
    })
    .flat_map(futures_util::stream::iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::claude::{ClaudeUsage, StopReason};
    use crate::stream::{BlockEmitter, StreamEnd};

    /// Treats every payload as a text fragment; `"skip"` has no effect.
    struct EchoDecoder;

    impl DeltaDecoder for EchoDecoder {
        fn decode(&mut self, payload: &str, cursor: BlockCursor) -> DecodeOutcome {
            if payload == "skip" {
                return DecodeOutcome::NoEffect;
            }
            let mut emitter = BlockEmitter::new(cursor);
            emitter.text_block(payload.to_string());
            emitter.into_outcome()
        }

        fn finish(&mut self, _cursor: BlockCursor) -> StreamEnd {
            StreamEnd {
                events: Vec::new(),
                stop_reason: StopReason::EndTurn,
                usage: Some(ClaudeUsage {
                    input_tokens: 1,
                    output_tokens: 2,
                }),
            }
        }
    }

    #[test]
    fn first_record_opens_message_with_model() {
        let mut driver = EnvelopeDriver::new(Box::new(EchoDecoder));
        let events = driver.on_record(r#"{"model":"gpt-4o"}"#);
        match &events[0] {
            ClaudeStreamEvent::MessageStart { message } => {
                assert_eq!(message.model, "gpt-4o");
                assert!(message.id.starts_with("msg_"));
            }
            other => panic!("expected message_start, got {other:?}"),
        }
        assert_eq!(driver.cursor().text, 1);
        assert!(driver.on_record("skip").is_empty());
    }

    #[test]
    fn close_without_records_still_brackets() {
        let mut driver = EnvelopeDriver::new(Box::new(EchoDecoder));
        let events = driver.close();
        let names: Vec<_> = events.iter().map(ClaudeStreamEvent::event_name).collect();
        assert_eq!(names, ["message_start", "message_delta", "message_stop"]);
        assert!(driver.close().is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn close_logs_stop_reason_and_usage() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let mut driver = EnvelopeDriver::new(Box::new(EchoDecoder));
            driver.on_record("hi");
            driver.close();
        });
        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("client stream closed"));
        assert!(output.contains("stop_reason=EndTurn"));
        assert!(output.contains("output_tokens: 2"));
        assert!(output.contains("blocks=1"));
    }

    #[tokio::test]
    async fn stream_stops_at_done_sentinel() {
        let body: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from_static(
            b"data: one\n\ndata: [DONE]\n\ndata: late\n\n",
        ))];
        let frames: Vec<_> = drive_sse(futures_util::stream::iter(body), Box::new(EchoDecoder))
            .map(|frame| String::from_utf8(frame.to_vec()).unwrap())
            .collect()
            .await;
        let text = frames.concat();
        assert!(text.contains("\"text\":\"one\""));
        assert!(!text.contains("late"));
        assert!(text.ends_with("event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n"));
        assert!(text.contains("\"usage\":{\"input_tokens\":1,\"output_tokens\":2}"));
    }
}
