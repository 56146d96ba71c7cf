//! The conversation loop for Ferrule.
//!
//! The agent follows a **prompt → model → tools → model** cycle:
//!
//! 1. **Receive** a human prompt and append it to the [`Session`]
//! 2. **Send** the transcript and tool definitions through the model gateway
//! 3. **If tool calls**: guard, dispatch and answer each one, then go to 2
//! 4. **If text**: that is the turn's final content
//! 5. **Stop** on the termination keyword, otherwise wait for the next prompt
//!
//! Models that write calls as prose are handled by [`repair`], before
//! step 4 gives up on them.

pub mod orchestrator;
pub mod prompt;
pub mod repair;
pub mod runner;
pub mod session;
pub mod stream_event;

pub use orchestrator::{TurnOrchestrator, TurnOutcome, TurnState};
pub use prompt::system_prompt;
pub use runner::{
    AgentRunner, HumanInput, PromptSource, RunSummary, ScriptedInput, StopReason, classify,
};
pub use session::{Session, TERMINATION_KEYWORD, contains_termination_keyword};
pub use stream_event::{AgentStreamEvent, CollectingSink, OutputSink};
