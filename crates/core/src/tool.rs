//! Tool trait and registry — the dispatch contract between the loop and
//! local capabilities.
//!
//! Tools are what let the model act: read and write files, search a
//! project, run shell commands. The registry owns them and turns every
//! [`ToolCallRequest`] into a [`ToolResult`]; dispatch never fails, so a
//! bad call becomes conversational content the model can correct.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use crate::error::ToolError;
use crate::message::ToolCallRequest;
use crate::provider::{ToolDefinition, is_identifier_safe};

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    /// A successful result. The call id is filled in by the registry.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    /// A failed result whose text explains what went wrong.
    pub fn error(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: false,
            output: output.into(),
            data: None,
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    fn for_call(mut self, call_id: &str) -> Self {
        self.call_id = call_id.to_string();
        self
    }
}

/// The core Tool trait.
///
/// Each executor (file system, search, shell, ...) implements this trait.
/// `execute` may return `Err`; the registry converts it into an error
/// result so nothing propagates past dispatch.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "fileSystemTool").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, in registration order.
///
/// The orchestrator uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Dispatch the calls the model issues
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Names must be unique and identifier-safe.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> std::result::Result<(), ToolError> {
        let name = tool.name();
        if !is_identifier_safe(name) {
            return Err(ToolError::InvalidName(name.to_string()));
        }
        if self.get(name).is_some() {
            return Err(ToolError::DuplicateName(name.to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate and execute a tool call.
    ///
    /// Always resolves: unknown tools, unparseable arguments, schema
    /// violations and executor failures all come back as error results
    /// bound to `call.id`.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            warn!(tool = %call.name, "Unknown tool requested");
            return ToolResult::error(format!(
                "Error: unknown tool '{}'. Available tools: {}",
                call.name,
                self.names().join(", ")
            ))
            .for_call(&call.id);
        };

        let arguments = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(reason) => {
                debug!(tool = %call.name, %reason, "Rejected tool arguments");
                return ToolResult::error(format!("Error: invalid arguments for '{}': {reason}", call.name))
                    .for_call(&call.id);
            }
        };

        if let Err(reason) = validate_arguments(&tool.parameters_schema(), &arguments) {
            debug!(tool = %call.name, %reason, "Arguments failed schema validation");
            return ToolResult::error(format!("Error: invalid arguments for '{}': {reason}", call.name))
                .for_call(&call.id);
        }

        match tool.execute(arguments).await {
            Ok(result) => result.for_call(&call.id),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                ToolResult::error(format!("Error: {e}")).for_call(&call.id)
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse raw argument text into a JSON object.
///
/// Blank arguments count as an empty object; some backends send `""` for
/// tools called without parameters.
fn parse_arguments(raw: &str) -> std::result::Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("arguments are not valid JSON ({e})"))?;
    if !value.is_object() {
        return Err(format!("arguments must be a JSON object, got {}", json_type_name(&value)));
    }
    Ok(value)
}

/// Check an argument object against the subset of JSON Schema the tools
/// declare: `required`, per-property `type`, and `enum`.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> std::result::Result<(), String> {
    let Some(args) = arguments.as_object() else {
        return Err("arguments must be a JSON object".into());
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            match args.get(key) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required key '{key}'"));
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args {
        let Some(spec) = properties.get(key) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        if let Some(expected) = spec.get("type").and_then(Value::as_str)
            && !matches_type(expected, value)
        {
            return Err(format!(
                "key '{key}' must be of type {expected}, got {}",
                json_type_name(value)
            ));
        }
        if let Some(allowed) = spec.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            let options: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            return Err(format!("key '{key}' must be one of {}", options.join(", ")));
        }
    }

    Ok(())
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// A simple test tool for unit tests.
    struct EchoTool {
        calls: AtomicUsize,
    }

    impl EchoTool {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "mode": { "type": "string", "enum": ["plain", "upper"] },
                    "repeat": { "type": "integer" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: Value) -> std::result::Result<ToolResult, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            if text == "boom" {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "echo".into(),
                    reason: "exploded".into(),
                });
            }
            Ok(ToolResult::ok(text).with_data(serde_json::json!({ "call_number": n })))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool::new())).unwrap();
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = registry();
        let err = registry.register(Box::new(EchoTool::new())).unwrap_err();
        assert!(matches!(err, ToolError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dotted_name_rejected_at_registration() {
        struct Dotted;
        #[async_trait]
        impl Tool for Dotted {
            fn name(&self) -> &str { "fs.read" }
            fn description(&self) -> &str { "" }
            fn parameters_schema(&self) -> Value { serde_json::json!({}) }
            async fn execute(&self, _: Value) -> std::result::Result<ToolResult, ToolError> {
                Ok(ToolResult::ok(""))
            }
        }
        let mut registry = ToolRegistry::new();
        assert!(matches!(
            registry.register(Box::new(Dotted)),
            Err(ToolError::InvalidName(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_valid_call() {
        let registry = registry();
        let call = ToolCallRequest::new("call_1", "echo", r#"{"text": "hello world"}"#);
        let result = registry.dispatch(&call).await;
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_resolves_with_error() {
        let registry = registry();
        let call = ToolCallRequest::new("call_1", "nonexistent", "{}");
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert!(result.output.contains("unknown tool 'nonexistent'"));
        assert!(result.output.contains("echo"));
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn dispatch_malformed_json_resolves_with_parse_error() {
        let registry = registry();
        let call = ToolCallRequest::new("call_2", "echo", r#"{"text": "unterminated"#);
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert!(result.output.contains("not valid JSON"));
    }

    #[tokio::test]
    async fn dispatch_non_object_arguments() {
        let registry = registry();
        let call = ToolCallRequest::new("call_3", "echo", r#"["text"]"#);
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert!(result.output.contains("must be a JSON object"));
    }

    #[tokio::test]
    async fn dispatch_missing_required_key() {
        let registry = registry();
        let call = ToolCallRequest::new("call_4", "echo", r#"{"mode": "plain"}"#);
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert!(result.output.contains("missing required key 'text'"));
    }

    #[tokio::test]
    async fn dispatch_wrong_type_and_enum() {
        let registry = registry();
        let wrong_type = ToolCallRequest::new("a", "echo", r#"{"text": 42}"#);
        let result = registry.dispatch(&wrong_type).await;
        assert!(result.output.contains("must be of type string"));

        let bad_enum = ToolCallRequest::new("b", "echo", r#"{"text": "x", "mode": "loud"}"#);
        let result = registry.dispatch(&bad_enum).await;
        assert!(result.output.contains("must be one of"));
    }

    #[tokio::test]
    async fn dispatch_wraps_executor_failure() {
        let registry = registry();
        let call = ToolCallRequest::new("call_5", "echo", r#"{"text": "boom"}"#);
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert!(result.output.starts_with("Error:"));
        assert!(result.output.contains("exploded"));
        assert_eq!(result.call_id, "call_5");
    }

    #[tokio::test]
    async fn repeated_dispatch_is_independent() {
        let registry = registry();
        let call = ToolCallRequest::new("call_6", "echo", r#"{"text": "again"}"#);
        let first = registry.dispatch(&call).await;
        let second = registry.dispatch(&call).await;
        assert_eq!(first.output, second.output);
        assert_eq!(first.data.unwrap()["call_number"], 1);
        assert_eq!(second.data.unwrap()["call_number"], 2);
    }

    #[test]
    fn blank_arguments_are_an_empty_object() {
        assert_eq!(parse_arguments("  ").unwrap(), serde_json::json!({}));
    }
}
