//! Flattening of client messages into the pieces every backend dialect needs.

use serde_json::Value;

use super::claude::{ClaudeContent, ClaudeContentBlock, ClaudeMessage};
use super::mapping::{normalize_client_role, ClientRole};

/// Hook applied to every tool `input_schema` before it reaches a backend.
pub trait SchemaSanitizer: Send + Sync {
    fn sanitize(&self, schema: &Value) -> Value;
}

/// Sanitizer that forwards schemas unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySanitizer;

impl SchemaSanitizer for IdentitySanitizer {
    fn sanitize(&self, schema: &Value) -> Value {
        schema.clone()
    }
}

/// A tool invocation with its input already serialized to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatToolResult {
    pub tool_use_id: String,
    pub content: String,
}

/// One client message reduced to role, joined text, calls and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FlatTurn {
    pub role: ClientRole,
    pub text: Option<String>,
    pub tool_calls: Vec<FlatToolCall>,
    pub tool_results: Vec<FlatToolResult>,
}

impl FlatTurn {
    /// Whether the turn needs its own content message/item. A turn made only
    /// of tool results does not; an entirely empty turn still does.
    pub(crate) fn has_content(&self) -> bool {
        self.text.is_some() || !self.tool_calls.is_empty() || self.tool_results.is_empty()
    }
}

pub(crate) fn flatten_turn(message: &ClaudeMessage) -> FlatTurn {
    let role = normalize_client_role(&message.role);
    let mut texts: Vec<&str> = Vec::new();
    let mut tool_calls = Vec::new();
    let mut tool_results = Vec::new();

    match &message.content {
        ClaudeContent::Text(text) => texts.push(text),
        ClaudeContent::Blocks(blocks) => {
            for block in blocks {
                match block {
                    ClaudeContentBlock::Text { text } => texts.push(text),
                    ClaudeContentBlock::ToolUse { id, name, input } => {
                        tool_calls.push(FlatToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            arguments: serialize_input(input),
                        });
                    }
                    ClaudeContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => {
                        let mut content = tool_result_text(content.as_ref());
                        // Backends have no error flag on tool output.
                        if is_error.unwrap_or(false) {
                            content.insert_str(0, "ERROR: ");
                        }
                        tool_results.push(FlatToolResult {
                            tool_use_id: tool_use_id.clone(),
                            content,
                        });
                    }
                    ClaudeContentBlock::Unsupported => {}
                }
            }
        }
    }

    let text = if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    };

    FlatTurn {
        role,
        text,
        tool_calls,
        tool_results,
    }
}

fn serialize_input(input: &Value) -> String {
    if input.is_null() {
        "{}".to_string()
    } else {
        input.to_string()
    }
}

/// Tool-result payloads: strings pass through, lists of text blocks join with
/// newlines, anything else is serialized as JSON.
fn tool_result_text(content: Option<&Value>) -> String {
    match content {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|block| {
                if block.get("type").and_then(Value::as_str) == Some("text") {
                    block.get("text").and_then(Value::as_str)
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(value: Value) -> ClaudeMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_blocks_join_with_newline() {
        let turn = flatten_turn(&message(json!({
            "role": "user",
            "content": [
                {"type": "text", "text": "one"},
                {"type": "image", "source": {}},
                {"type": "text", "text": "two"}
            ]
        })));
        assert_eq!(turn.text.as_deref(), Some("one\ntwo"));
        assert!(turn.has_content());
    }

    #[test]
    fn tool_use_input_is_serialized() {
        let turn = flatten_turn(&message(json!({
            "role": "assistant",
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "f", "input": {"a": 1}}]
        })));
        assert_eq!(turn.role, ClientRole::Assistant);
        assert_eq!(turn.tool_calls[0].arguments, "{\"a\":1}");
        assert!(turn.text.is_none());
    }

    #[test]
    fn tool_result_payload_shapes() {
        let turn = flatten_turn(&message(json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "a", "content": "plain"},
                {"type": "tool_result", "tool_use_id": "b", "content": [
                    {"type": "text", "text": "x"}, {"type": "text", "text": "y"}
                ]},
                {"type": "tool_result", "tool_use_id": "c", "content": {"ok": true}, "is_error": true}
            ]
        })));
        let contents: Vec<_> = turn
            .tool_results
            .iter()
            .map(|result| result.content.as_str())
            .collect();
        assert_eq!(contents, ["plain", "x\ny", "ERROR: {\"ok\":true}"]);
        assert!(!turn.has_content());
    }

    #[test]
    fn identity_sanitizer_keeps_schema() {
        let schema = json!({"type": "object", "properties": {}});
        assert_eq!(IdentitySanitizer.sanitize(&schema), schema);
    }
}
