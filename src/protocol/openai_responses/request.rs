use serde_json::{json, Value};

use crate::protocol::claude::{ClaudeRequest, ClaudeTool};
use crate::protocol::flatten::{flatten_turn, FlatTurn, SchemaSanitizer};
use crate::protocol::mapping::ClientRole;

use super::{ResponsesInputContent, ResponsesInputItem, ResponsesRequest, ResponsesTool};

/// Encode a Claude request into the Responses API wire format.
///
/// The system prompt travels as `instructions`. Each turn yields its message
/// item first, then its function calls, then its function-call outputs.
#[must_use]
pub fn encode_responses_request(
    request: &ClaudeRequest,
    sanitizer: &dyn SchemaSanitizer,
) -> ResponsesRequest {
    let mut input = Vec::with_capacity(request.messages.len());
    for message in &request.messages {
        push_turn(&mut input, flatten_turn(message));
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

    ResponsesRequest {
        model: request.model.clone(),
        input,
        instructions: request.system.as_ref().and_then(|system| system.to_prompt()),
        tools,
        tool_choice: request.tool_choice.as_ref().and_then(encode_tool_choice),
        stream: request.is_stream().then_some(true),
        temperature: request.temperature,
        max_output_tokens: request.max_tokens,
        top_p: request.top_p,
    }
}

fn push_turn(input: &mut Vec<ResponsesInputItem>, turn: FlatTurn) {
    let needs_message =
        turn.text.is_some() || (turn.tool_calls.is_empty() && turn.tool_results.is_empty());

    if needs_message {
        let text = turn.text.unwrap_or_default();
        let (role, content) = match turn.role {
            ClientRole::Assistant => ("assistant", ResponsesInputContent::OutputText { text }),
            ClientRole::System => ("system", ResponsesInputContent::InputText { text }),
            // The Responses API has no `tool` message role.
            ClientRole::User | ClientRole::Tool => {
                ("user", ResponsesInputContent::InputText { text })
            }
        };
        input.push(ResponsesInputItem::Message {
            role: role.to_string(),
            content: vec![content],
        });
    }

    input.extend(
        turn.tool_calls
            .into_iter()
            .map(|call| ResponsesInputItem::FunctionCall {
                call_id: call.id,
                name: call.name,
                arguments: call.arguments,
            }),
    );
    input.extend(
        turn.tool_results
            .into_iter()
            .map(|result| ResponsesInputItem::FunctionCallOutput {
                call_id: result.tool_use_id,
                output: result.content,
            }),
    );
}

fn encode_tool(tool: &ClaudeTool, sanitizer: &dyn SchemaSanitizer) -> ResponsesTool {
    ResponsesTool {
        type_: "function".to_string(),
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: sanitizer.sanitize(&tool.input_schema),
    }
}

fn encode_tool_choice(choice: &Value) -> Option<Value> {
    match choice.get("type").and_then(Value::as_str)? {
        "auto" => Some(Value::String("auto".to_string())),
        "any" => Some(Value::String("required".to_string())),
        "none" => Some(Value::String("none".to_string())),
        "tool" => {
            let name = choice.get("name").and_then(Value::as_str)?;
            Some(json!({"type": "function", "name": name}))
        }
        _ => None,
    }
}
