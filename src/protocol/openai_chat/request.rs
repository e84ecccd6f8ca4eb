use serde_json::{json, Value};

use crate::protocol::claude::{ClaudeRequest, ClaudeTool};
use crate::protocol::flatten::{flatten_turn, FlatTurn, SchemaSanitizer};
use crate::protocol::mapping::client_role_to_openai;

use super::{
    OpenAiChatRequest, OpenAiMessage, OpenAiStreamOptions, OpenAiTool, OpenAiToolCall,
    OpenAiToolCallFunction, OpenAiToolFunction,
};

/// Encode a Claude request into the `OpenAI` Chat Completions wire format.
///
/// The system prompt becomes a leading `system` message. Tool results of a
/// turn are emitted as `tool` messages before that turn's content message.
#[must_use]
pub fn encode_chat_request(
    request: &ClaudeRequest,
    sanitizer: &dyn SchemaSanitizer,
) -> OpenAiChatRequest {
    let system = request.system.as_ref().and_then(|system| system.to_prompt());
    let mut messages: Vec<OpenAiMessage> =
        Vec::with_capacity(request.messages.len() + usize::from(system.is_some()));

    if let Some(system) = system {
        messages.push(OpenAiMessage::text("system", system));
    }

    for message in &request.messages {
        push_turn(&mut messages, flatten_turn(message));
    }

    let tools = request
        .tools
        .as_ref()
        .filter(|tools| !tools.is_empty())
        .map(|tools| {
            tools
                .iter()
                .map(|tool| encode_tool(tool, sanitizer))
                .collect()
        });

    let stream = request.is_stream();
    let reasoning = uses_max_completion_tokens(&request.model);

    OpenAiChatRequest {
        model: request.model.clone(),
        messages,
        tools,
        tool_choice: request.tool_choice.as_ref().and_then(encode_tool_choice),
        stream: stream.then_some(true),
        stream_options: stream.then_some(OpenAiStreamOptions {
            include_usage: Some(true),
        }),
        temperature: if reasoning { None } else { request.temperature },
        max_tokens: if reasoning { None } else { request.max_tokens },
        max_completion_tokens: if reasoning { request.max_tokens } else { None },
        top_p: request.top_p,
        stop: request
            .stop_sequences
            .clone()
            .filter(|stops| !stops.is_empty()),
    }
}

fn push_turn(messages: &mut Vec<OpenAiMessage>, turn: FlatTurn) {
    let has_content = turn.has_content();

    for result in turn.tool_results {
        messages.push(OpenAiMessage {
            role: "tool".to_string(),
            content: Some(result.content),
            tool_calls: None,
            tool_call_id: Some(result.tool_use_id),
        });
    }

    if !has_content {
        return;
    }

    let tool_calls = if turn.tool_calls.is_empty() {
        None
    } else {
        Some(
            turn.tool_calls
                .into_iter()
                .map(|call| OpenAiToolCall {
                    id: call.id,
                    type_: "function".to_string(),
                    function: OpenAiToolCallFunction {
                        name: call.name,
                        arguments: call.arguments,
                    },
                })
                .collect(),
        )
    };

    // An assistant turn made only of tool calls carries null content.
    let content = match (&turn.text, &tool_calls) {
        (None, Some(_)) => None,
        _ => Some(turn.text.unwrap_or_default()),
    };

    messages.push(OpenAiMessage {
        role: client_role_to_openai(turn.role).to_string(),
        content,
        tool_calls,
        tool_call_id: None,
    });
}

fn encode_tool(tool: &ClaudeTool, sanitizer: &dyn SchemaSanitizer) -> OpenAiTool {
    OpenAiTool {
        type_: "function".to_string(),
        function: OpenAiToolFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: sanitizer.sanitize(&tool.input_schema),
        },
    }
}

/// Map Claude's `tool_choice` object onto the Chat Completions form.
fn encode_tool_choice(choice: &Value) -> Option<Value> {
    match choice.get("type").and_then(Value::as_str)? {
        "auto" => Some(Value::String("auto".to_string())),
        "any" => Some(Value::String("required".to_string())),
        "none" => Some(Value::String("none".to_string())),
        "tool" => {
            let name = choice.get("name").and_then(Value::as_str)?;
            Some(json!({"type": "function", "function": {"name": name}}))
        }
        _ => None,
    }
}

/// Reasoning model families reject `max_tokens` and a custom `temperature`.
pub(crate) fn uses_max_completion_tokens(model: &str) -> bool {
    let name = model.rsplit('/').next().unwrap_or(model).to_ascii_lowercase();
    ["o1", "o3", "o4", "gpt-5"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
