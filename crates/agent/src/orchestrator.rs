//! Turn orchestrator — drives one human prompt to its final content.
//!
//! A turn moves through [`TurnState`]s:
//!
//! 1. **AwaitingModel**: send the transcript and tool definitions to the gateway
//! 2. **StreamingContent**: forward content chunks to the output as they arrive
//! 3. **HandlingToolCalls**: guard and dispatch every call in the batch, in
//!    request order, appending one tool message per call; then back to 1
//! 4. **TurnComplete**: a response without calls closes the turn
//! 5. **AwaitingHuman** or **SessionTerminated**, depending on the
//!    termination keyword and the session's input mode
//!
//! Gateway failures end the turn with an `Error: ...` final content instead
//! of propagating. Tool failures are tool messages the model reads on the
//! next round.

use crate::repair;
use crate::session::{Session, contains_termination_keyword};
use crate::stream_event::{AgentStreamEvent, OutputSink};
use ferrule_config::{InputMode, RepairPolicy};
use ferrule_core::message::{Message, ToolCallRequest};
use ferrule_core::provider::{ApiType, ToolDefinition, Usage};
use ferrule_core::tool::ToolRegistry;
use ferrule_providers::{GatewayEvent, ModelGateway};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where the orchestrator is within a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingModel,
    StreamingContent,
    HandlingToolCalls,
    TurnComplete,
    AwaitingHuman,
    SessionTerminated,
}

/// What a finished turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The content that closed the turn
    pub final_content: String,
    /// Model round trips made
    pub rounds: u32,
    /// Tool calls answered (dispatched or rejected)
    pub tool_calls: usize,
    /// Calls rebuilt from prose
    pub repaired_calls: usize,
    /// Whether the session ended with this turn
    pub terminated: bool,
    /// `AwaitingHuman` or `SessionTerminated`
    pub state: TurnState,
    /// Token usage reported for the last response, if any
    pub usage: Option<Usage>,
}

/// One model response, drained.
#[derive(Default)]
struct Response {
    content: String,
    calls: Vec<ToolCallRequest>,
    usage: Option<Usage>,
}

pub struct TurnOrchestrator {
    gateway: Arc<ModelGateway>,
    repair: RepairPolicy,
    max_rounds: Option<u32>,
}

impl TurnOrchestrator {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self {
            gateway,
            repair: RepairPolicy::default(),
            max_rounds: None,
        }
    }

    /// Choose what happens to calls rebuilt from prose.
    pub fn with_repair(mut self, policy: RepairPolicy) -> Self {
        self.repair = policy;
        self
    }

    /// Cap model round trips per turn.
    pub fn with_max_rounds(mut self, max: Option<u32>) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn api_type(&self) -> ApiType {
        self.gateway.api_type()
    }

    /// Run one turn for `prompt`.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        prompt: &str,
        sink: &mut dyn OutputSink,
    ) -> TurnOutcome {
        if session.is_terminated() {
            return TurnOutcome {
                final_content: String::new(),
                rounds: 0,
                tool_calls: 0,
                repaired_calls: 0,
                terminated: true,
                state: TurnState::SessionTerminated,
                usage: None,
            };
        }

        session.begin_turn(prompt);
        info!(session_id = %session.id(), turn = session.turns(), "Turn started");

        let registry = Arc::clone(session.toolset());
        let definitions = registry.definitions();
        let tools = (!definitions.is_empty()).then_some(definitions.as_slice());

        let mut rounds = 0u32;
        let mut tool_calls = 0usize;
        let mut repaired_calls = 0usize;
        let mut usage = None;

        let final_content = loop {
            if let Some(max) = self.max_rounds
                && rounds >= max
            {
                warn!(session_id = %session.id(), rounds, "Round limit reached");
                let content = format!(
                    "Stopped after {rounds} model round trips without a final answer."
                );
                session.record(Message::assistant(&content));
                break content;
            }
            rounds += 1;

            debug!(session_id = %session.id(), round = rounds, state = ?TurnState::AwaitingModel, "Calling model");
            let response = match self
                .next_response(session.transcript().messages(), tools, sink)
                .await
            {
                Ok(response) => response,
                Err(message) => {
                    warn!(session_id = %session.id(), error = %message, "Gateway failure");
                    sink.emit(AgentStreamEvent::Error {
                        message: message.clone(),
                    });
                    session.record(Message::assistant(&message));
                    break message;
                }
            };
            if response.usage.is_some() {
                usage = response.usage;
            }

            if !response.calls.is_empty() {
                debug!(state = ?TurnState::HandlingToolCalls, count = response.calls.len(), "Tool calls requested");
                let calls: Vec<ToolCallRequest> =
                    response.calls.into_iter().map(with_call_id).collect();
                session.record(Message::assistant_with_calls(
                    response.content,
                    calls.clone(),
                ));
                for call in &calls {
                    self.answer_call(session, &registry, call, sink).await;
                    tool_calls += 1;
                }
                continue;
            }

            if self.repair != RepairPolicy::Off
                && let Some(call) = repair::repair(&response.content)
            {
                let dispatched = self.repair == RepairPolicy::Dispatch;
                info!(tool = %call.name, id = %call.id, dispatched, "Repaired tool call from text");
                sink.emit(AgentStreamEvent::CallRepaired {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    dispatched,
                });
                repaired_calls += 1;

                if dispatched {
                    session.record(Message::assistant_with_calls(
                        response.content,
                        vec![call.clone()],
                    ));
                    self.answer_call(session, &registry, &call, sink).await;
                    tool_calls += 1;
                    continue;
                }
            }

            session.record(Message::assistant(&response.content));
            break response.content;
        };

        debug!(state = ?TurnState::TurnComplete, rounds, tool_calls, "Turn complete");
        sink.emit(AgentStreamEvent::Final {
            content: final_content.clone(),
        });
        sink.emit(AgentStreamEvent::Done {
            rounds,
            tool_calls_made: tool_calls,
            usage: usage.clone(),
        });

        let state = if contains_termination_keyword(&final_content) {
            info!(session_id = %session.id(), "Termination keyword received");
            TurnState::SessionTerminated
        } else {
            match session.input_mode() {
                InputMode::Always => TurnState::AwaitingHuman,
                InputMode::Never => TurnState::SessionTerminated,
            }
        };
        if state == TurnState::SessionTerminated {
            session.terminate();
        }

        TurnOutcome {
            final_content,
            rounds,
            tool_calls,
            repaired_calls,
            terminated: state == TurnState::SessionTerminated,
            state,
            usage,
        }
    }

    /// Call the gateway and drain its events, forwarding content chunks.
    /// Failures come back as the user-visible error text.
    async fn next_response(
        &self,
        messages: &[Message],
        tools: Option<&[ToolDefinition]>,
        sink: &mut dyn OutputSink,
    ) -> Result<Response, String> {
        let mut stream = self
            .gateway
            .complete(messages, tools)
            .await
            .map_err(|e| format!("Error: {e}"))?;

        let mut response = Response::default();
        while let Some(event) = stream.next_event().await {
            match event.map_err(|e| format!("Error: {e}"))? {
                GatewayEvent::Content(text) => {
                    if response.content.is_empty() {
                        debug!(state = ?TurnState::StreamingContent, "Receiving content");
                    }
                    sink.emit(AgentStreamEvent::Chunk {
                        content: text.clone(),
                    });
                    response.content.push_str(&text);
                }
                GatewayEvent::ToolCall(call) => response.calls.push(call),
                GatewayEvent::Done(usage) => response.usage = usage,
            }
        }
        Ok(response)
    }

    /// Guard, dispatch and record one call. Every call gets exactly one tool
    /// message, including calls the dialect guard refuses.
    async fn answer_call(
        &self,
        session: &mut Session,
        registry: &ToolRegistry,
        call: &ToolCallRequest,
        sink: &mut dyn OutputSink,
    ) {
        let api_type = self.gateway.api_type();
        if !api_type.allows_tool_name(&call.name) {
            let reason = format!(
                "tool name '{}' is not valid for the {api_type} API. Use only the exact tool \
                 names ({}) without dots or other punctuation.",
                call.name,
                registry.names().join(", ")
            );
            warn!(tool = %call.name, id = %call.id, "Rejected tool name");
            sink.emit(AgentStreamEvent::ToolNameRejected {
                id: call.id.clone(),
                name: call.name.clone(),
                reason: reason.clone(),
            });
            session.record(Message::tool_result(&call.id, format!("Warning: {reason}")));
            return;
        }

        let input = serde_json::from_str(&call.arguments)
            .unwrap_or_else(|_| serde_json::Value::String(call.arguments.clone()));
        sink.emit(AgentStreamEvent::ToolCall {
            id: call.id.clone(),
            name: call.name.clone(),
            input,
        });

        let result = registry.dispatch(call).await;
        debug!(tool = %call.name, id = %call.id, success = result.success, "Tool dispatched");

        sink.emit(AgentStreamEvent::ToolResult {
            id: call.id.clone(),
            name: call.name.clone(),
            output: result.output.clone(),
            success: result.success,
        });
        session.record(Message::tool_result(&result.call_id, result.output));
    }
}

/// Calls must be answerable by id; give anonymous ones a fresh id.
fn with_call_id(mut call: ToolCallRequest) -> ToolCallRequest {
    if call.id.trim().is_empty() {
        call.id = format!("call_{}", Uuid::new_v4().simple());
    }
    call
}
