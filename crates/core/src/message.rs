//! Message and transcript domain types.
//!
//! These are the value objects that flow through the whole loop:
//! the human types a prompt → the session records it → the gateway answers
//! with text or tool calls → tool results are recorded against their calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. Empty when an assistant message only carries calls.
    pub content: String,

    /// Tool calls requested by the assistant (if any), in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content);
        msg.tool_calls = calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A model-issued request to invoke a named tool.
///
/// `arguments` stays raw text until dispatch: models regularly emit
/// malformed JSON, and the parse failure must reach the model as a tool
/// result rather than be lost while decoding the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique ID for this tool call (gateway-assigned or repair-assigned)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON text
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// The `operation` argument, if the arguments parse and carry one.
    /// Used for display only.
    pub fn operation(&self) -> Option<String> {
        serde_json::from_str::<serde_json::Value>(&self.arguments)
            .ok()?
            .get("operation")?
            .as_str()
            .map(String::from)
    }
}

/// The ordered message log sent to the model on every request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript whose first entry is the given system prompt.
    pub fn with_system(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// IDs of tool calls that were requested but have no tool message yet,
    /// in request order.
    pub fn unanswered_calls(&self) -> Vec<&str> {
        let mut pending: Vec<&str> = Vec::new();
        for msg in &self.messages {
            match msg.role {
                Role::Assistant => {
                    pending.extend(msg.tool_calls.iter().map(|tc| tc.id.as_str()));
                }
                Role::Tool => {
                    if let Some(id) = msg.tool_call_id.as_deref() {
                        pending.retain(|p| *p != id);
                    }
                }
                _ => {}
            }
        }
        pending
    }

    /// Whether any requested tool call is still unanswered.
    pub fn has_dangling_calls(&self) -> bool {
        !self.unanswered_calls().is_empty()
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn transcript_starts_with_system_prompt() {
        let transcript = Transcript::with_system("be helpful");
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.messages()[0].role, Role::System);
    }

    #[test]
    fn unanswered_calls_tracks_tool_results() {
        let mut transcript = Transcript::with_system("sys");
        transcript.push(Message::user("list files"));
        transcript.push(Message::assistant_with_calls(
            "",
            vec![
                ToolCallRequest::new("call_a", "fileSearchTool", "{}"),
                ToolCallRequest::new("call_b", "bashExecutorTool", "{}"),
            ],
        ));
        assert_eq!(transcript.unanswered_calls(), vec!["call_a", "call_b"]);

        transcript.push(Message::tool_result("call_a", "ok"));
        assert_eq!(transcript.unanswered_calls(), vec!["call_b"]);
        assert!(transcript.has_dangling_calls());

        transcript.push(Message::tool_result("call_b", "ok"));
        assert!(!transcript.has_dangling_calls());
    }

    #[test]
    fn operation_is_read_from_arguments() {
        let call = ToolCallRequest::new("1", "fileSystemTool", r#"{"operation":"read"}"#);
        assert_eq!(call.operation().as_deref(), Some("read"));

        let broken = ToolCallRequest::new("2", "fileSystemTool", "{not json");
        assert!(broken.operation().is_none());
    }

    #[test]
    fn tool_message_serializes_call_id() {
        let msg = Message::tool_result("call_1", "done");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""tool_call_id":"call_1""#));
        assert!(json.contains(r#""role":"tool""#));
    }
}
