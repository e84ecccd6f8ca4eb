//! Reassembly of tool-call arguments that arrive fragmented across records.
//!
//! Each backend slot owns an append-only argument buffer. After every merge
//! the buffer is parsed; a failed parse means "not yet" and is never an
//! error. Once the buffer holds a complete JSON object (and the dialect's id
//! requirement is met) the call is handed out and the slot is freed.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::util::next_tool_use_id;

/// One tool-call fragment decoded from a backend record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallFragment {
    /// Backend slot index, not the client-visible block index.
    pub slot: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// When the client learns that the turn ends in tool use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolUseSignal {
    /// Emit `message_delta { stop_reason: tool_use }` as soon as a tool block closes.
    Early,
    /// Only the end-of-stream `message_delta` carries the reason.
    Deferred,
}

/// Per-dialect accumulator hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolCallPolicy {
    /// Hold a completed call until the backend has sent its id.
    pub require_id: bool,
    pub signal: ToolUseSignal,
}

/// A tool call whose arguments parsed, ready to become a tool-use block.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum ArgumentsState {
    Empty,
    Accumulating,
    Complete(Value),
}

#[derive(Debug)]
struct PendingToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
    state: ArgumentsState,
}

impl PendingToolCall {
    fn new() -> Self {
        Self {
            id: None,
            name: None,
            arguments: String::new(),
            state: ArgumentsState::Empty,
        }
    }

    fn apply(&mut self, fragment: ToolCallFragment) {
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            self.id = Some(id);
        }
        if let Some(name) = fragment.name.filter(|name| !name.is_empty()) {
            self.name = Some(name);
        }
        if let Some(arguments) = fragment.arguments.filter(|args| !args.is_empty()) {
            self.arguments.push_str(&arguments);
            self.state = parse_arguments(&self.arguments);
        }
    }

    fn ready(&self, policy: ToolCallPolicy) -> bool {
        matches!(self.state, ArgumentsState::Complete(_))
            && (self.id.is_some() || !policy.require_id)
    }

    fn into_completed(self) -> Option<CompletedToolCall> {
        let ArgumentsState::Complete(input) = self.state else {
            return None;
        };
        Some(CompletedToolCall {
            id: self.id.unwrap_or_else(next_tool_use_id),
            name: self.name.unwrap_or_default(),
            input,
        })
    }
}

fn parse_arguments(buffer: &str) -> ArgumentsState {
    if buffer.trim().is_empty() {
        return ArgumentsState::Empty;
    }
    match serde_json::from_str::<Value>(buffer) {
        Ok(value) if value.is_object() => ArgumentsState::Complete(value),
        _ => ArgumentsState::Accumulating,
    }
}

/// Tool-call accumulator shared by every streaming dialect.
#[derive(Debug)]
pub struct ToolCallAccumulator {
    policy: ToolCallPolicy,
    slots: FxHashMap<u32, PendingToolCall>,
}

impl ToolCallAccumulator {
    #[must_use]
    pub fn new(policy: ToolCallPolicy) -> Self {
        Self {
            policy,
            slots: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn policy(&self) -> ToolCallPolicy {
        self.policy
    }

    /// Merge a fragment into its slot. Returns the call once it is complete;
    /// the slot is then free for an unrelated later call.
    pub fn merge(&mut self, fragment: ToolCallFragment) -> Option<CompletedToolCall> {
        let slot = fragment.slot;
        let entry = self.slots.entry(slot).or_insert_with(PendingToolCall::new);
        entry.apply(fragment);
        if !entry.ready(self.policy) {
            return None;
        }
        self.slots.remove(&slot)?.into_completed()
    }

    /// Number of slots still waiting for more fragments.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.slots.len()
    }

    /// Whether a slot has seen any argument text yet.
    #[must_use]
    pub fn has_arguments(&self, slot: u32) -> bool {
        self.slots
            .get(&slot)
            .is_some_and(|entry| entry.state != ArgumentsState::Empty)
    }

    /// Drop every incomplete call and return how many were discarded.
    pub fn discard_incomplete(&mut self) -> usize {
        let dropped = self.slots.len();
        for (slot, entry) in self.slots.drain() {
            tracing::debug!(
                slot,
                name = entry.name.as_deref().unwrap_or(""),
                buffered = entry.arguments.len(),
                "dropping incomplete tool call at end of stream"
            );
        }
        dropped
    }
}
