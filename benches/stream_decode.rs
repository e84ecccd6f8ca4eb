use criterion::{black_box, criterion_group, criterion_main, Criterion};

use claude_bridge::protocol::openai_chat::stream::ChatDeltaDecoder;
use claude_bridge::protocol::openai_responses::stream::ResponsesDeltaDecoder;
use claude_bridge::stream::sse::encode_claude_event;
use claude_bridge::stream::{EnvelopeDriver, SseParser};
use serde_json::json;

/// A chat stream of `fragments` text chunks followed by one split tool call.
fn chat_sse_body(fragments: usize) -> String {
    let mut body = String::new();
    for i in 0..fragments {
        let chunk = json!({"choices": [{"index": 0, "delta": {"content": format!("token{i} ")}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    for piece in ["{\"city\":", "\"San ", "Francisco\"}"] {
        let chunk = json!({"choices": [{"index": 0, "delta": {"tool_calls": [{"index": 0, "id": "call_1", "function": {"name": "get_weather", "arguments": piece}}]}}]});
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    body.push_str(
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
    );
    body.push_str("data: [DONE]\n\n");
    body
}

fn responses_payloads(fragments: usize) -> Vec<String> {
    let mut payloads = Vec::with_capacity(fragments + 3);
    for i in 0..fragments {
        payloads.push(
            json!({"type": "response.output_text.delta", "output_index": 0, "delta": format!("token{i} ")})
                .to_string(),
        );
    }
    payloads.push(
        json!({
            "type": "response.output_item.added",
            "output_index": 1,
            "item": {"type": "function_call", "call_id": "c1", "name": "f", "arguments": ""}
        })
        .to_string(),
    );
    payloads.push(
        json!({
            "type": "response.function_call_arguments.delta",
            "output_index": 1,
            "delta": "{\"q\":1}"
        })
        .to_string(),
    );
    payloads.push(
        json!({
            "type": "response.completed",
            "response": {
                "status": "completed",
                "output": [],
                "usage": {"input_tokens": 1, "output_tokens": 2}
            }
        })
        .to_string(),
    );
    payloads
}

fn bench_chat_stream(c: &mut Criterion) {
    let body = chat_sse_body(256);

    c.bench_function("chat_sse_parse_decode_encode_256", |b| {
        b.iter(|| {
            let mut parser = SseParser::new();
            let mut driver = EnvelopeDriver::new(Box::new(ChatDeltaDecoder::new()));
            let mut bytes = 0usize;
            for record in parser.feed(black_box(&body)) {
                if record.is_done() {
                    break;
                }
                for event in driver.on_record(&record.data) {
                    bytes += encode_claude_event(&event).map_or(0, |frame| frame.len());
                }
            }
            for event in driver.close() {
                bytes += encode_claude_event(&event).map_or(0, |frame| frame.len());
            }
            black_box(bytes)
        });
    });

    c.bench_function("sse_parse_chunked_64b", |b| {
        b.iter(|| {
            let mut parser = SseParser::new();
            let mut records = Vec::new();
            let mut rest = body.as_str();
            while !rest.is_empty() {
                let mut split = rest.len().min(64);
                while !rest.is_char_boundary(split) {
                    split += 1;
                }
                let (head, tail) = rest.split_at(split);
                parser.feed_into(black_box(head), &mut records);
                rest = tail;
            }
            black_box(records.len())
        });
    });
}

fn bench_responses_stream(c: &mut Criterion) {
    let payloads = responses_payloads(256);

    c.bench_function("responses_decode_256", |b| {
        b.iter(|| {
            let mut driver = EnvelopeDriver::new(Box::new(ResponsesDeltaDecoder::new()));
            let mut events = 0usize;
            for payload in &payloads {
                events += driver.on_record(black_box(payload)).len();
            }
            events += driver.close().len();
            black_box(events)
        });
    });
}

criterion_group!(benches, bench_chat_stream, bench_responses_stream);
criterion_main!(benches);
