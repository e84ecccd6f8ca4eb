use super::claude::StopReason;

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

/// Normalized client message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Normalize a client role: case-insensitive, `tools` is an alias of `tool`,
/// anything unrecognized folds to `user`.
#[must_use]
pub fn normalize_client_role(role: &str) -> ClientRole {
    let role = role.trim();
    if role.eq_ignore_ascii_case("assistant") {
        ClientRole::Assistant
    } else if role.eq_ignore_ascii_case("system") {
        ClientRole::System
    } else if role.eq_ignore_ascii_case("tool") || role.eq_ignore_ascii_case("tools") {
        ClientRole::Tool
    } else {
        ClientRole::User
    }
}

#[must_use]
pub fn client_role_to_openai(role: ClientRole) -> &'static str {
    match role {
        ClientRole::System => "system",
        ClientRole::User => "user",
        ClientRole::Assistant => "assistant",
        ClientRole::Tool => "tool",
    }
}

// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn openai_finish_to_stop(s: &str) -> StopReason {
    match s {
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

/// Map a Responses API `incomplete_details.reason` to a stop reason.
#[must_use]
pub fn responses_incomplete_to_stop(reason: Option<&str>) -> StopReason {
    match reason {
        Some("max_output_tokens") => StopReason::MaxTokens,
        _ => StopReason::EndTurn,
    }
}

/// Final stop reason shared by the streaming and non-streaming paths.
///
/// A response that produced at least one tool-use block always ends with
/// `tool_use`, whatever the backend reported; otherwise the backend's reason
/// wins, defaulting to `end_turn`.
#[must_use]
pub fn resolve_stop_reason(backend: Option<StopReason>, saw_tool_use: bool) -> StopReason {
    if saw_tool_use {
        return StopReason::ToolUse;
    }
    match backend {
        Some(StopReason::ToolUse) | None => StopReason::EndTurn,
        Some(reason) => reason,
    }
}
