pub mod accumulator;
pub mod driver;
pub mod sse;

pub use accumulator::{
    CompletedToolCall, ToolCallAccumulator, ToolCallFragment, ToolCallPolicy, ToolUseSignal,
};
pub use driver::{drive_sse, EnvelopeDriver};
pub use sse::{sse_record_stream, SseParser, SseRecord};

use crate::protocol::claude::{
    ClaudeDelta, ClaudeResponseBlock, ClaudeStreamEvent, ClaudeUsage, StopReason,
};

/// Output block cursor for one streamed response.
///
/// Text and tool-use blocks are counted independently. The client-visible
/// index of the next block is the number of blocks opened so far, so indices
/// never repeat and grow strictly in emission order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockCursor {
    pub text: usize,
    pub tool_use: usize,
}

impl BlockCursor {
    #[must_use]
    pub fn next_index(self) -> usize {
        self.text + self.tool_use
    }

    #[must_use]
    pub fn advance_text(self) -> Self {
        Self {
            text: self.text + 1,
            ..self
        }
    }

    #[must_use]
    pub fn advance_tool_use(self) -> Self {
        Self {
            tool_use: self.tool_use + 1,
            ..self
        }
    }
}

/// Result of decoding one upstream record.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Nothing to forward: bookkeeping only, an incomplete tool call, or a
    /// record that failed to parse.
    NoEffect,
    Emit {
        events: Vec<ClaudeStreamEvent>,
        cursor: BlockCursor,
    },
}

/// What a decoder reports once the upstream stream has ended.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEnd {
    /// Closing events for blocks still open (coalesced text).
    pub events: Vec<ClaudeStreamEvent>,
    pub stop_reason: StopReason,
    pub usage: Option<ClaudeUsage>,
}

/// Per-dialect decode callback driven by [`EnvelopeDriver`].
///
/// A decoder instance belongs to exactly one response; it owns the tool-call
/// accumulator and any other scratch state for that response.
pub trait DeltaDecoder: Send {
    /// Decode one upstream JSON payload given the current cursor.
    fn decode(&mut self, payload: &str, cursor: BlockCursor) -> DecodeOutcome;

    /// Flush state at end of stream. Pending tool calls are dropped here.
    fn finish(&mut self, cursor: BlockCursor) -> StreamEnd;
}

/// Collects client events for one record while advancing a cursor.
#[derive(Debug)]
pub(crate) struct BlockEmitter {
    events: Vec<ClaudeStreamEvent>,
    cursor: BlockCursor,
}

impl BlockEmitter {
    pub(crate) fn new(cursor: BlockCursor) -> Self {
        Self {
            events: Vec::new(),
            cursor,
        }
    }

    /// Emit a complete text block (start, one delta, stop).
    pub(crate) fn text_block(&mut self, text: String) {
        let index = self.open_text();
        self.text_delta(index, text);
        self.close(index);
    }

    /// Open a text block and return its index.
    pub(crate) fn open_text(&mut self) -> usize {
        let index = self.cursor.next_index();
        self.events.push(ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ClaudeResponseBlock::Text {
                text: String::new(),
            },
        });
        self.cursor = self.cursor.advance_text();
        index
    }

    pub(crate) fn text_delta(&mut self, index: usize, text: String) {
        self.events.push(ClaudeStreamEvent::ContentBlockDelta {
            index,
            delta: ClaudeDelta::TextDelta { text },
        });
    }

    pub(crate) fn close(&mut self, index: usize) {
        self.events.push(ClaudeStreamEvent::ContentBlockStop { index });
    }

    /// Emit a complete tool-use block carrying the full input in one delta.
    pub(crate) fn tool_use_block(&mut self, call: CompletedToolCall, signal: ToolUseSignal) {
        let index = self.cursor.next_index();
        let partial_json = call.input.to_string();
        self.events.push(ClaudeStreamEvent::ContentBlockStart {
            index,
            content_block: ClaudeResponseBlock::ToolUse {
                id: call.id,
                name: call.name,
                input: serde_json::Value::Object(serde_json::Map::new()),
            },
        });
        self.events.push(ClaudeStreamEvent::ContentBlockDelta {
            index,
            delta: ClaudeDelta::InputJsonDelta { partial_json },
        });
        self.close(index);
        self.cursor = self.cursor.advance_tool_use();
        if signal == ToolUseSignal::Early {
            self.events.push(ClaudeStreamEvent::stop_reason(StopReason::ToolUse, None));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub(crate) fn into_events(self) -> Vec<ClaudeStreamEvent> {
        self.events
    }

    pub(crate) fn into_outcome(self) -> DecodeOutcome {
        if self.is_empty() {
            DecodeOutcome::NoEffect
        } else {
            DecodeOutcome::Emit {
                events: self.events,
                cursor: self.cursor,
            }
        }
    }
}
