use claude_bridge::protocol::claude::{
    ClaudeDelta, ClaudeRequest, ClaudeResponseBlock, ClaudeStreamEvent, StopReason,
};
use claude_bridge::protocol::openai_chat::request::encode_chat_request;
use claude_bridge::protocol::openai_chat::response::decode_chat_response;
use claude_bridge::protocol::openai_chat::stream::ChatDeltaDecoder;
use claude_bridge::protocol::openai_responses::request::encode_responses_request;
use claude_bridge::protocol::openai_responses::response::decode_responses_response;
use claude_bridge::protocol::openai_responses::stream::ResponsesDeltaDecoder;
use claude_bridge::protocol::IdentitySanitizer;
use claude_bridge::stream::{DeltaDecoder, EnvelopeDriver};
use serde_json::{json, Value};

fn run(decoder: Box<dyn DeltaDecoder>, payloads: &[Value]) -> Vec<ClaudeStreamEvent> {
    let mut driver = EnvelopeDriver::new(decoder);
    let mut events = Vec::new();
    for payload in payloads {
        events.extend(driver.on_record(&payload.to_string()));
    }
    events.extend(driver.close());
    events
}

fn block_starts(events: &[ClaudeStreamEvent]) -> Vec<(usize, &ClaudeResponseBlock)> {
    events
        .iter()
        .filter_map(|event| match event {
            ClaudeStreamEvent::ContentBlockStart {
                index,
                content_block,
            } => Some((*index, content_block)),
            _ => None,
        })
        .collect()
}

fn text_of(events: &[ClaudeStreamEvent]) -> String {
    events
        .iter()
        .filter_map(|event| match event {
            ClaudeStreamEvent::ContentBlockDelta {
                delta: ClaudeDelta::TextDelta { text },
                ..
            } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn final_stop_reason(events: &[ClaudeStreamEvent]) -> Option<StopReason> {
    events.iter().rev().find_map(|event| match event {
        ClaudeStreamEvent::MessageDelta { delta, .. } => delta.stop_reason,
        _ => None,
    })
}

fn chat_text(text: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": text}}]})
}

fn chat_tool(slot: u32, id: Option<&str>, name: Option<&str>, arguments: &str) -> Value {
    let mut call = json!({"index": slot, "function": {"arguments": arguments}});
    if let Some(id) = id {
        call["id"] = json!(id);
    }
    if let Some(name) = name {
        call["function"]["name"] = json!(name);
    }
    json!({"choices": [{"index": 0, "delta": {"tool_calls": [call]}}]})
}

#[test]
fn block_indices_are_unique_and_increasing() {
    let payloads = vec![
        chat_text("a"),
        chat_tool(0, Some("call_a"), Some("one"), "{}"),
        chat_text("b"),
        chat_tool(1, Some("call_b"), Some("two"), "{\"x\":1}"),
        chat_text("c"),
    ];
    let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);
    let indices: Vec<usize> = block_starts(&events).iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, [0, 1, 2, 3, 4]);

    let mut open = Vec::new();
    for event in &events {
        match event {
            ClaudeStreamEvent::ContentBlockStart { index, .. } => open.push(*index),
            ClaudeStreamEvent::ContentBlockStop { index } => {
                assert_eq!(open.pop(), Some(*index), "blocks close in open order");
            }
            ClaudeStreamEvent::ContentBlockDelta { index, .. } => {
                assert_eq!(open.last(), Some(index), "delta targets the open block");
            }
            _ => {}
        }
    }
    assert!(open.is_empty());
}

#[test]
fn text_tool_text_interleave_keeps_emission_order() {
    let payloads = vec![
        chat_text("before"),
        chat_tool(0, Some("call_1"), Some("lookup"), "{\"q\":\"x\"}"),
        chat_text("after"),
    ];
    let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);
    let starts = block_starts(&events);
    assert_eq!(starts.len(), 3);
    assert!(matches!(starts[0], (0, ClaudeResponseBlock::Text { .. })));
    assert!(matches!(starts[1], (1, ClaudeResponseBlock::ToolUse { .. })));
    assert!(matches!(starts[2], (2, ClaudeResponseBlock::Text { .. })));
    assert_eq!(final_stop_reason(&events), Some(StopReason::ToolUse));
}

#[test]
fn split_arguments_reassemble_into_one_call() {
    let payloads = vec![
        chat_tool(0, Some("call_1"), Some("search"), "{\"query\""),
        chat_tool(0, None, None, ":\"rust"),
        chat_tool(0, None, None, " sse\"}"),
    ];
    let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);
    let starts = block_starts(&events);
    assert_eq!(starts.len(), 1);
    let arguments: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            ClaudeStreamEvent::ContentBlockDelta {
                delta: ClaudeDelta::InputJsonDelta { partial_json },
                ..
            } => Some(partial_json.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(arguments, ["{\"query\":\"rust sse\"}"]);
}

#[test]
fn incomplete_tool_call_leaves_no_gap() {
    let payloads = vec![
        chat_text("partial"),
        chat_tool(0, Some("call_1"), Some("never_done"), "{\"a\":"),
        chat_text("tail"),
    ];
    let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);
    let indices: Vec<usize> = block_starts(&events).iter().map(|(index, _)| *index).collect();
    assert_eq!(indices, [0, 1]);
    assert_eq!(final_stop_reason(&events), Some(StopReason::EndTurn));
}

#[test]
fn every_stream_is_bracketed() {
    for payloads in [vec![], vec![json!({"garbage": true})], vec![chat_text("x")]] {
        let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);
        assert_eq!(events.first().map(ClaudeStreamEvent::event_name), Some("message_start"));
        assert_eq!(events.last().map(ClaudeStreamEvent::event_name), Some("message_stop"));
        let deltas = events
            .iter()
            .filter(|event| matches!(event, ClaudeStreamEvent::MessageDelta { .. }))
            .count();
        assert_eq!(deltas, 1);
    }
}

#[test]
fn stream_and_buffered_responses_agree() {
    let payloads = vec![
        chat_text("The weather "),
        chat_text("is sunny."),
        chat_tool(0, Some("call_w"), Some("get_weather"), "{\"city\":\"SF\"}"),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "tool_calls"}]}),
    ];
    let events = run(Box::new(ChatDeltaDecoder::new()), &payloads);

    let buffered = decode_chat_response(
        json!({
            "id": "chatcmpl_1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "The weather is sunny.",
                    "tool_calls": [{
                        "id": "call_w",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"SF\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    let buffered_text: String = buffered
        .content
        .iter()
        .filter_map(|block| match block {
            ClaudeResponseBlock::Text { text } => Some(text.as_str()),
            ClaudeResponseBlock::ToolUse { .. } => None,
        })
        .collect();
    assert_eq!(text_of(&events), buffered_text);

    let streamed_tool = block_starts(&events)
        .into_iter()
        .find_map(|(_, block)| match block {
            ClaudeResponseBlock::ToolUse { id, name, .. } => Some((id.clone(), name.clone())),
            ClaudeResponseBlock::Text { .. } => None,
        });
    let buffered_tool = buffered.content.iter().find_map(|block| match block {
        ClaudeResponseBlock::ToolUse { id, name, input } => {
            assert_eq!(input, &json!({"city": "SF"}));
            Some((id.clone(), name.clone()))
        }
        ClaudeResponseBlock::Text { .. } => None,
    });
    assert_eq!(streamed_tool, buffered_tool);
    assert_eq!(final_stop_reason(&events), buffered.stop_reason);
}

/// Rebuild the final content blocks from a streamed event sequence.
fn streamed_blocks(events: &[ClaudeStreamEvent]) -> Vec<ClaudeResponseBlock> {
    let mut blocks: Vec<ClaudeResponseBlock> = Vec::new();
    let mut arguments: Vec<String> = Vec::new();
    for event in events {
        match event {
            ClaudeStreamEvent::ContentBlockStart { content_block, .. } => {
                blocks.push(content_block.clone());
                arguments.push(String::new());
            }
            ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
                ClaudeDelta::TextDelta { text } => match &mut blocks[*index] {
                    ClaudeResponseBlock::Text { text: block } => block.push_str(text),
                    other => panic!("text delta for {other:?}"),
                },
                ClaudeDelta::InputJsonDelta { partial_json } => {
                    arguments[*index].push_str(partial_json);
                }
            },
            _ => {}
        }
    }
    for (block, buffer) in blocks.iter_mut().zip(&arguments) {
        if let ClaudeResponseBlock::ToolUse { input, .. } = block {
            *input = serde_json::from_str(buffer).unwrap();
        }
    }
    blocks
}

#[test]
fn responses_stream_and_buffered_responses_agree() {
    let payloads = vec![
        json!({"type": "response.created", "response": {"model": "gpt-4.1"}}),
        json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "message", "content": []}}),
        json!({"type": "response.output_text.delta", "output_index": 0, "delta": "Looking "}),
        json!({"type": "response.output_text.delta", "output_index": 0, "delta": "it up."}),
        json!({"type": "response.output_text.done", "output_index": 0, "text": "Looking it up."}),
        json!({"type": "response.output_item.added", "output_index": 1, "item": {"type": "function_call", "call_id": "", "name": "lookup", "arguments": ""}}),
        json!({"type": "response.function_call_arguments.delta", "output_index": 1, "delta": "{\"q\":"}),
        json!({"type": "response.function_call_arguments.delta", "output_index": 1, "delta": "\"rust\"}"}),
        json!({"type": "response.function_call_arguments.done", "output_index": 1, "arguments": "{\"q\":\"rust\"}"}),
        json!({"type": "response.output_item.done", "output_index": 1, "item": {"type": "function_call", "call_id": "call_9", "name": "lookup", "arguments": "{\"q\":\"rust\"}"}}),
        json!({"type": "response.completed", "response": {
            "model": "gpt-4.1",
            "status": "completed",
            "usage": {"input_tokens": 12, "output_tokens": 8}
        }}),
    ];
    let events = run(Box::new(ResponsesDeltaDecoder::new()), &payloads);

    let buffered = decode_responses_response(
        json!({
            "id": "resp_1",
            "model": "gpt-4.1",
            "status": "completed",
            "output": [
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Looking it up."}
                ]},
                {"type": "function_call", "call_id": "call_9", "name": "lookup", "arguments": "{\"q\":\"rust\"}"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 8}
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    let streamed = streamed_blocks(&events);
    assert_eq!(streamed.len(), 2, "text coalesced and call emitted once");
    assert_eq!(streamed, buffered.content);
    assert_eq!(final_stop_reason(&events), buffered.stop_reason);
    assert_eq!(buffered.stop_reason, Some(StopReason::ToolUse));
}

#[test]
fn responses_incomplete_maps_to_max_tokens_in_both_modes() {
    let payloads = vec![
        json!({"type": "response.output_text.delta", "output_index": 0, "delta": "cut "}),
        json!({"type": "response.output_text.delta", "output_index": 0, "delta": "short"}),
        json!({"type": "response.incomplete", "response": {
            "model": "gpt-4.1",
            "status": "incomplete",
            "incomplete_details": {"reason": "max_output_tokens"}
        }}),
    ];
    let events = run(Box::new(ResponsesDeltaDecoder::new()), &payloads);

    let buffered = decode_responses_response(
        json!({
            "model": "gpt-4.1",
            "status": "incomplete",
            "incomplete_details": {"reason": "max_output_tokens"},
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "cut short"}]}]
        })
        .to_string()
        .as_bytes(),
    )
    .unwrap();

    assert_eq!(streamed_blocks(&events), buffered.content);
    assert_eq!(final_stop_reason(&events), Some(StopReason::MaxTokens));
    assert_eq!(buffered.stop_reason, Some(StopReason::MaxTokens));
}

#[test]
fn responses_done_events_never_duplicate_a_call() {
    let payloads = vec![
        json!({"type": "response.output_item.added", "output_index": 0, "item": {"type": "function_call", "call_id": "c1", "name": "f", "arguments": ""}}),
        json!({"type": "response.function_call_arguments.delta", "output_index": 0, "delta": "{}"}),
        json!({"type": "response.function_call_arguments.done", "output_index": 0, "arguments": "{}"}),
        json!({"type": "response.output_item.done", "output_index": 0, "item": {"type": "function_call", "call_id": "c1", "name": "f", "arguments": "{}"}}),
    ];
    let events = run(Box::new(ResponsesDeltaDecoder::new()), &payloads);
    assert_eq!(block_starts(&events).len(), 1);
}

fn client_request(value: Value) -> ClaudeRequest {
    serde_json::from_value(value).unwrap()
}

#[test]
fn role_aliases_normalize_in_both_dialects() {
    let request = client_request(json!({
        "model": "m",
        "messages": [
            {"role": "USER", "content": "hi"},
            {"role": "Assistant", "content": "hello"},
            {"role": "narrator", "content": "again"}
        ]
    }));
    let chat = encode_chat_request(&request, &IdentitySanitizer);
    let roles: Vec<&str> = chat.messages.iter().map(|message| message.role.as_str()).collect();
    assert_eq!(roles, ["user", "assistant", "user"]);

    let responses =
        serde_json::to_value(encode_responses_request(&request, &IdentitySanitizer)).unwrap();
    assert_eq!(responses["input"][0]["role"], "user");
    assert_eq!(responses["input"][1]["role"], "assistant");
    assert_eq!(responses["input"][2]["role"], "user");
}

#[test]
fn system_prompt_placement_differs_per_dialect() {
    let request = client_request(json!({
        "model": "m",
        "system": [{"type": "text", "text": "A"}, {"type": "text", "text": "B"}],
        "messages": [{"role": "user", "content": "hi"}]
    }));
    let chat = encode_chat_request(&request, &IdentitySanitizer);
    assert_eq!(chat.messages[0].role, "system");
    assert_eq!(chat.messages[0].content.as_deref(), Some("A\nB"));

    let responses = encode_responses_request(&request, &IdentitySanitizer);
    assert_eq!(responses.instructions.as_deref(), Some("A\nB"));
    assert_eq!(responses.input.len(), 1);
}

#[test]
fn failed_tool_results_are_marked_for_both_dialects() {
    let request = client_request(json!({
        "model": "m",
        "messages": [
            {"role": "assistant", "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "fetch", "input": {}}
            ]},
            {"role": "user", "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "timeout", "is_error": true}
            ]}
        ]
    }));
    let chat = encode_chat_request(&request, &IdentitySanitizer);
    let tool = chat
        .messages
        .iter()
        .find(|message| message.role == "tool")
        .unwrap();
    assert_eq!(tool.tool_call_id.as_deref(), Some("toolu_1"));
    assert_eq!(tool.content.as_deref(), Some("ERROR: timeout"));

    let responses =
        serde_json::to_value(encode_responses_request(&request, &IdentitySanitizer)).unwrap();
    let output = responses["input"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["type"] == "function_call_output")
        .unwrap();
    assert_eq!(output["call_id"], "toolu_1");
    assert_eq!(output["output"], "ERROR: timeout");
}
