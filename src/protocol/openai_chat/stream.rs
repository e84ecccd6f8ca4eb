//! Chat Completions streaming decoder.
//!
//! Every non-empty text fragment becomes its own text block. Tool-call
//! fragments are reassembled per `tool_calls[].index` and surface as a
//! single tool-use block once their arguments parse.

use crate::protocol::claude::{ClaudeUsage, StopReason};
use crate::protocol::mapping::{openai_finish_to_stop, resolve_stop_reason};
use crate::stream::{
    BlockCursor, BlockEmitter, DecodeOutcome, DeltaDecoder, StreamEnd, ToolCallAccumulator,
    ToolCallFragment, ToolCallPolicy, ToolUseSignal,
};

use super::response::usage_from_openai;
use super::OpenAiStreamChunk;

const CHAT_TOOL_POLICY: ToolCallPolicy = ToolCallPolicy {
    require_id: false,
    signal: ToolUseSignal::Early,
};

#[derive(Debug)]
pub struct ChatDeltaDecoder {
    tool_calls: ToolCallAccumulator,
    finish_reason: Option<StopReason>,
    usage: Option<ClaudeUsage>,
}

impl Default for ChatDeltaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatDeltaDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tool_calls: ToolCallAccumulator::new(CHAT_TOOL_POLICY),
            finish_reason: None,
            usage: None,
        }
    }
}

impl DeltaDecoder for ChatDeltaDecoder {
    fn decode(&mut self, payload: &str, cursor: BlockCursor) -> DecodeOutcome {
        let chunk: OpenAiStreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::trace!("skipping unparseable chat chunk: {err}");
                return DecodeOutcome::NoEffect;
            }
        };

        if chunk.usage.is_some() {
            self.usage = Some(usage_from_openai(chunk.usage));
        }

        let mut emitter = BlockEmitter::new(cursor);
        for choice in chunk.choices.into_iter().filter(|choice| choice.index == 0) {
            if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
                emitter.text_block(text);
            }

            for call in choice.delta.tool_calls.unwrap_or_default() {
                let (name, arguments) = call
                    .function
                    .map_or((None, None), |function| (function.name, function.arguments));
                let fragment = ToolCallFragment {
                    slot: call.index,
                    id: call.id,
                    name,
                    arguments,
                };
                if let Some(completed) = self.tool_calls.merge(fragment) {
                    emitter.tool_use_block(completed, self.tool_calls.policy().signal);
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref() {
                self.finish_reason = Some(openai_finish_to_stop(reason));
            }
        }
        emitter.into_outcome()
    }

    fn finish(&mut self, cursor: BlockCursor) -> StreamEnd {
        self.tool_calls.discard_incomplete();
        StreamEnd {
            events: Vec::new(),
            stop_reason: resolve_stop_reason(self.finish_reason, cursor.tool_use > 0),
            usage: Some(self.usage.unwrap_or_default()),
        }
    }
}
