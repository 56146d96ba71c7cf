//! Agent-level output events.
//!
//! `AgentStreamEvent` turns gateway chunks and dispatch outcomes into the
//! events an output surface renders. The terminal prints them; tests
//! collect them.

use ferrule_core::provider::Usage;
use serde::{Deserialize, Serialize};

/// Events emitted by the agent while a turn runs.
///
/// - `chunk`              — partial text from the model
/// - `tool_call`          — a call is about to be dispatched
/// - `tool_result`        — dispatch finished
/// - `tool_name_rejected` — the dialect guard refused a call name
/// - `call_repaired`      — a call was rebuilt from prose
/// - `final`              — the turn's final content
/// - `notice`             — local feedback (cwd changes, input errors)
/// - `done`               — turn statistics
/// - `error`              — a gateway failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Chunk { content: String },

    /// The agent is calling a tool.
    ToolCall {
        id: String,
        name: String,
        input: serde_json::Value,
    },

    /// Tool execution completed.
    ToolResult {
        id: String,
        name: String,
        output: String,
        success: bool,
    },

    /// A call was not dispatched because its name is illegal for the dialect.
    ToolNameRejected {
        id: String,
        name: String,
        reason: String,
    },

    /// A tool call was reconstructed from plain text.
    CallRepaired {
        id: String,
        name: String,
        dispatched: bool,
    },

    /// The content that closes the turn.
    Final { content: String },

    /// Local feedback that never reaches the model.
    Notice { message: String },

    /// The turn is complete.
    Done {
        rounds: u32,
        tool_calls_made: usize,
        usage: Option<Usage>,
    },

    /// The gateway failed; the message also becomes the final content.
    Error { message: String },
}

impl AgentStreamEvent {
    /// Event name, as used in the serialized `type` tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::ToolNameRejected { .. } => "tool_name_rejected",
            Self::CallRepaired { .. } => "call_repaired",
            Self::Final { .. } => "final",
            Self::Notice { .. } => "notice",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}

/// Where agent events go.
pub trait OutputSink: Send {
    fn emit(&mut self, event: AgentStreamEvent);
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub events: Vec<AgentStreamEvent>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenated `chunk` content.
    pub fn streamed_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Chunk { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Every `final` content, in order.
    pub fn finals(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AgentStreamEvent::Final { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Count events of one type.
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl OutputSink for CollectingSink {
    fn emit(&mut self, event: AgentStreamEvent) {
        self.events.push(event);
    }
}
