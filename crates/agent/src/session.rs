//! Conversation session: the transcript and the state around it.
//!
//! A session is created once per process run. Its transcript starts with
//! the system prompt and only grows; the only writer is the orchestrator,
//! through the crate-private mutators below. Once terminated, a session is
//! frozen.

use ferrule_config::InputMode;
use ferrule_core::message::{Message, Transcript};
use ferrule_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Final content containing this (any case) ends the session.
pub const TERMINATION_KEYWORD: &str = "TERMINATE";

/// Whether `text` carries the termination keyword.
pub fn contains_termination_keyword(text: &str) -> bool {
    text.to_ascii_uppercase().contains(TERMINATION_KEYWORD)
}

pub struct Session {
    id: String,
    transcript: Transcript,
    toolset: Arc<ToolRegistry>,
    input_mode: InputMode,
    terminated: bool,
    turns: u32,
}

impl Session {
    pub fn new(
        system_prompt: impl Into<String>,
        toolset: Arc<ToolRegistry>,
        input_mode: InputMode,
    ) -> Self {
        let id = Uuid::new_v4().to_string();
        debug!(session_id = %id, tools = toolset.len(), ?input_mode, "Session created");
        Self {
            id,
            transcript: Transcript::with_system(system_prompt),
            toolset,
            input_mode,
            terminated: false,
            turns: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn toolset(&self) -> &Arc<ToolRegistry> {
        &self.toolset
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of turns started so far.
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Start a turn with the human's prompt.
    pub(crate) fn begin_turn(&mut self, prompt: impl Into<String>) {
        self.turns += 1;
        self.record(Message::user(prompt));
    }

    /// Append a message. Ignored once the session is terminated.
    pub(crate) fn record(&mut self, message: Message) {
        if self.terminated {
            warn!(session_id = %self.id, role = ?message.role, "Dropping message for terminated session");
            return;
        }
        self.transcript.push(message);
    }

    pub(crate) fn terminate(&mut self) {
        if !self.terminated {
            debug!(session_id = %self.id, turns = self.turns, "Session terminated");
        }
        self.terminated = true;
    }
}
