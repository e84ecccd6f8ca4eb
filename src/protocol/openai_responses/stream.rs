//! Responses API streaming decoder.
//!
//! Text deltas coalesce into one open text block. Function-call arguments
//! are reassembled per `output_index`; a call is only emitted once its
//! `call_id` is known, and the `tool_use` stop reason waits for stream end.

use rustc_hash::FxHashSet;

use crate::protocol::claude::{ClaudeUsage, StopReason};
use crate::protocol::mapping::resolve_stop_reason;
use crate::stream::{
    BlockCursor, BlockEmitter, DecodeOutcome, DeltaDecoder, StreamEnd, ToolCallAccumulator,
    ToolCallFragment, ToolCallPolicy, ToolUseSignal,
};

use super::response::{backend_stop_reason, usage_from_responses};
use super::{ResponsesOutput, ResponsesOutputItem, ResponsesStreamEvent};

const RESPONSES_TOOL_POLICY: ToolCallPolicy = ToolCallPolicy {
    require_id: true,
    signal: ToolUseSignal::Deferred,
};

#[derive(Debug)]
pub struct ResponsesDeltaDecoder {
    tool_calls: ToolCallAccumulator,
    /// Output indices whose call has already been emitted.
    emitted: FxHashSet<u32>,
    open_text: Option<usize>,
    stop_reason: Option<StopReason>,
    usage: Option<ClaudeUsage>,
}

impl Default for ResponsesDeltaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponsesDeltaDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tool_calls: ToolCallAccumulator::new(RESPONSES_TOOL_POLICY),
            emitted: FxHashSet::default(),
            open_text: None,
            stop_reason: None,
            usage: None,
        }
    }

    fn close_text(&mut self, emitter: &mut BlockEmitter) {
        if let Some(index) = self.open_text.take() {
            emitter.close(index);
        }
    }

    fn merge(&mut self, emitter: &mut BlockEmitter, fragment: ToolCallFragment) {
        if self.emitted.contains(&fragment.slot) {
            return;
        }
        let slot = fragment.slot;
        if let Some(completed) = self.tool_calls.merge(fragment) {
            self.emitted.insert(slot);
            self.close_text(emitter);
            emitter.tool_use_block(completed, self.tool_calls.policy().signal);
        }
    }

    /// Full arguments reported by a `done` event; only used when no delta
    /// for the slot was seen.
    fn complete_arguments(&mut self, slot: u32, arguments: String) -> Option<String> {
        if self.tool_calls.has_arguments(slot) || arguments.is_empty() {
            None
        } else {
            Some(arguments)
        }
    }

    fn finalize(&mut self, response: &ResponsesOutput) {
        if let Some(reason) = backend_stop_reason(response) {
            self.stop_reason = Some(reason);
        }
        if response.usage.is_some() {
            self.usage = Some(usage_from_responses(response.usage));
        }
    }
}

impl DeltaDecoder for ResponsesDeltaDecoder {
    fn decode(&mut self, payload: &str, cursor: BlockCursor) -> DecodeOutcome {
        let event: ResponsesStreamEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(err) => {
                tracing::trace!("skipping unparseable responses event: {err}");
                return DecodeOutcome::NoEffect;
            }
        };

        let mut emitter = BlockEmitter::new(cursor);
        match event {
            ResponsesStreamEvent::OutputTextDelta { delta } => {
                if !delta.is_empty() {
                    let index = match self.open_text {
                        Some(index) => index,
                        None => {
                            let index = emitter.open_text();
                            self.open_text = Some(index);
                            index
                        }
                    };
                    emitter.text_delta(index, delta);
                }
            }
            ResponsesStreamEvent::OutputTextDone {} => self.close_text(&mut emitter),
            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                if let ResponsesOutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } = item
                {
                    let fragment = ToolCallFragment {
                        slot: output_index,
                        id: Some(call_id),
                        name: Some(name),
                        arguments: Some(arguments),
                    };
                    self.merge(&mut emitter, fragment);
                }
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta {
                output_index,
                delta,
            } => {
                let fragment = ToolCallFragment {
                    slot: output_index,
                    arguments: Some(delta),
                    ..ToolCallFragment::default()
                };
                self.merge(&mut emitter, fragment);
            }
            ResponsesStreamEvent::FunctionCallArgumentsDone {
                output_index,
                arguments,
            } => {
                let arguments = self.complete_arguments(output_index, arguments);
                if arguments.is_some() {
                    let fragment = ToolCallFragment {
                        slot: output_index,
                        arguments,
                        ..ToolCallFragment::default()
                    };
                    self.merge(&mut emitter, fragment);
                }
            }
            ResponsesStreamEvent::OutputItemDone { output_index, item } => {
                if let ResponsesOutputItem::FunctionCall {
                    call_id,
                    name,
                    arguments,
                } = item
                {
                    let fragment = ToolCallFragment {
                        slot: output_index,
                        id: Some(call_id),
                        name: Some(name),
                        arguments: self.complete_arguments(output_index, arguments),
                    };
                    self.merge(&mut emitter, fragment);
                }
            }
            ResponsesStreamEvent::Completed { response }
            | ResponsesStreamEvent::Incomplete { response } => self.finalize(&response),
            ResponsesStreamEvent::Failed { response } => {
                tracing::warn!(status = ?response.status, "backend reported response.failed");
                self.finalize(&response);
            }
            ResponsesStreamEvent::Error { message } => {
                tracing::warn!("backend stream error event: {message}");
            }
            ResponsesStreamEvent::Created {} | ResponsesStreamEvent::Other => {}
        }
        emitter.into_outcome()
    }

    fn finish(&mut self, cursor: BlockCursor) -> StreamEnd {
        let mut emitter = BlockEmitter::new(cursor);
        self.close_text(&mut emitter);
        self.tool_calls.discard_incomplete();
        StreamEnd {
            events: emitter.into_events(),
            stop_reason: resolve_stop_reason(self.stop_reason, cursor.tool_use > 0),
            usage: Some(self.usage.unwrap_or_default()),
        }
    }
}
