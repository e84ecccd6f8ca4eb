use serde_json::Value;

use crate::error::BridgeError;
use crate::protocol::claude::{ClaudeResponse, ClaudeResponseBlock, ClaudeUsage};
use crate::protocol::mapping::{openai_finish_to_stop, resolve_stop_reason};
use crate::util::next_message_id;

use super::{OpenAiChatResponse, OpenAiUsage};

/// Decode a complete Chat Completions response body into a Claude message.
///
/// Only the first choice is used. Tool calls whose arguments are not a JSON
/// object are dropped with a warning.
///
/// # Errors
///
/// Returns [`BridgeError::Translation`] when the body is not a Chat
/// Completions response.
pub fn decode_chat_response(body: &[u8]) -> Result<ClaudeResponse, BridgeError> {
    let response: OpenAiChatResponse = serde_json::from_slice(body)
        .map_err(|err| BridgeError::Translation(format!("invalid chat completion body: {err}")))?;

    let mut content = Vec::new();
    let mut backend_reason = None;

    if let Some(choice) = response.choices.into_iter().next() {
        backend_reason = choice.finish_reason.as_deref().map(openai_finish_to_stop);
        let message = choice.message;

        if let Some(text) = message.content.filter(|text| !text.is_empty()) {
            content.push(ClaudeResponseBlock::Text { text });
        }

        for call in message.tool_calls.unwrap_or_default() {
            match serde_json::from_str::<Value>(&call.function.arguments) {
                Ok(input) if input.is_object() => content.push(ClaudeResponseBlock::ToolUse {
                    id: call.id,
                    name: call.function.name,
                    input,
                }),
                _ => tracing::warn!(
                    tool = %call.function.name,
                    "dropping tool call with non-object arguments"
                ),
            }
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
        usage_from_openai(response.usage),
    ))
}

pub(crate) fn usage_from_openai(usage: Option<OpenAiUsage>) -> ClaudeUsage {
    usage.map_or_else(ClaudeUsage::default, |usage| ClaudeUsage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    })
}
