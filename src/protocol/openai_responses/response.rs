use serde_json::Value;

use crate::error::BridgeError;
use crate::protocol::claude::{ClaudeResponse, ClaudeResponseBlock, ClaudeUsage, StopReason};
use crate::protocol::mapping::{resolve_stop_reason, responses_incomplete_to_stop};
use crate::util::next_message_id;

use super::{ResponsesContentPart, ResponsesOutput, ResponsesOutputItem, ResponsesUsage};

/// Decode a complete Responses API body into a Claude message.
///
/// Each `output_text` part becomes one text block, each `function_call`
/// item one tool-use block keyed by its `call_id`.
///
/// # Errors
///
/// Returns [`BridgeError::Translation`] when the body is not a Responses
/// API object.
pub fn decode_responses_response(body: &[u8]) -> Result<ClaudeResponse, BridgeError> {
    let response: ResponsesOutput = serde_json::from_slice(body)
        .map_err(|err| BridgeError::Translation(format!("invalid responses body: {err}")))?;

    let backend_reason = backend_stop_reason(&response);
    let mut content = Vec::new();

    for item in response.output {
        match item {
            ResponsesOutputItem::Message { content: parts } => {
                for part in parts {
                    if let ResponsesContentPart::OutputText { text } = part {
                        if !text.is_empty() {
                            content.push(ClaudeResponseBlock::Text { text });
                        }
                    }
                }
            }
            ResponsesOutputItem::FunctionCall {
                call_id,
                name,
                arguments,
            } => match serde_json::from_str::<Value>(&arguments) {
                Ok(input) if input.is_object() && !call_id.is_empty() => {
                    content.push(ClaudeResponseBlock::ToolUse {
                        id: call_id,
                        name,
                        input,
                    });
                }
                _ => tracing::warn!(tool = %name, "dropping unusable function_call item"),
            },
            ResponsesOutputItem::Other => {}
        }
    }

    let saw_tool_use = content
        .iter()
        .any(|block| matches!(block, ClaudeResponseBlock::ToolUse { .. }));

    Ok(ClaudeResponse::new(
        next_message_id(),
        response.model,
        content,
        resolve_stop_reason(backend_reason, saw_tool_use),
        usage_from_responses(response.usage),
    ))
}

/// The stop reason implied by a final response object, if it reports one.
pub(crate) fn backend_stop_reason(response: &ResponsesOutput) -> Option<StopReason> {
    match response.status.as_deref() {
        Some("incomplete") => Some(responses_incomplete_to_stop(
            response
                .incomplete_details
                .as_ref()
                .and_then(|details| details.reason.as_deref()),
        )),
        Some("completed") => Some(StopReason::EndTurn),
        _ => None,
    }
}

pub(crate) fn usage_from_responses(usage: Option<ResponsesUsage>) -> ClaudeUsage {
    usage.map_or_else(ClaudeUsage::default, |usage| ClaudeUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    })
}
