//! Call repair: recover a tool call a model wrote as prose.
//!
//! Local models in particular answer "I'll read the file:
//! `{"operation": "read", "filePath": "/etc/hosts"}`" instead of issuing a
//! structured call. These functions detect that shape and rebuild a
//! [`ToolCallRequest`] from it. They are pure and know nothing about the
//! turn loop; the orchestrator decides what to do with the result.

use ferrule_core::message::ToolCallRequest;
use regex::{Regex, RegexSet};
use serde_json::Value;
use std::sync::LazyLock;
use uuid::Uuid;

static TOOL_INTENT: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r#"(?i)\{\s*"operation"\s*:"#,
        r#"(?i)\{\s*"command"\s*:"#,
        r"(?i)fileSystemTool",
        r"(?i)fileSearchTool",
        r"(?i)bashExecutorTool",
        r"(?i)use\s+.*\s+tool\s+to",
        r"(?i)using\s+the\s+(file|search|bash)",
    ])
    .unwrap()
});

/// A single flat JSON object that mentions `operation` or `command`.
static CALL_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[^{]*"(operation|command)"[^}]*\}"#).unwrap());

/// Whether `text` reads like an attempted tool call.
pub fn looks_like_tool_call(text: &str) -> bool {
    TOOL_INTENT.is_match(text)
}

/// Tool that serves a given `operation` value.
fn tool_for_operation(operation: &str) -> Option<&'static str> {
    match operation {
        "read" | "listDirectories" => Some("fileSystemTool"),
        "find" | "grep" | "exploreProject" => Some("fileSearchTool"),
        _ => None,
    }
}

/// Pull the first call-shaped JSON object out of `text`.
///
/// Returns `None` when nothing matches, the match is not valid JSON, or the
/// object carries no recognizable key.
pub fn extract_tool_call(text: &str) -> Option<ToolCallRequest> {
    let candidate = CALL_OBJECT.find(text)?.as_str();
    let value: Value = serde_json::from_str(candidate).ok()?;
    let object = value.as_object()?;

    let name = match object.get("operation").and_then(Value::as_str) {
        Some(operation) => tool_for_operation(operation)?,
        None if object.get("command").is_some_and(Value::is_string) => "bashExecutorTool",
        None => return None,
    };

    Some(ToolCallRequest::new(
        format!("repair_{}", Uuid::new_v4()),
        name,
        value.to_string(),
    ))
}

/// Detection followed by extraction.
pub fn repair(text: &str) -> Option<ToolCallRequest> {
    if !looks_like_tool_call(text) {
        return None;
    }
    extract_tool_call(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_inline_json_calls() {
        assert!(looks_like_tool_call(r#"Sure: { "operation": "read", "filePath": "a" }"#));
        assert!(looks_like_tool_call(r#"{"command": "ls"}"#));
        assert!(looks_like_tool_call("I will call the FILESYSTEMTOOL now"));
        assert!(looks_like_tool_call("Let me use the search tool to look"));
        assert!(looks_like_tool_call("Using the bash executor I get"));
    }

    #[test]
    fn ignores_plain_prose() {
        assert!(!looks_like_tool_call("The capital of France is Paris."));
        assert!(!looks_like_tool_call(r#"{"name": "value"}"#));
    }

    #[test]
    fn routes_read_to_file_system_tool() {
        let call = extract_tool_call(
            r#"I'll read it: {"operation": "read", "filePath": "/tmp/a.txt"} and report back."#,
        )
        .unwrap();
        assert_eq!(call.name, "fileSystemTool");
        assert!(call.id.starts_with("repair_"));
        let args: Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(args["filePath"], "/tmp/a.txt");
    }

    #[test]
    fn routes_search_operations() {
        for op in ["find", "grep", "exploreProject"] {
            let text = format!(r#"{{"operation": "{op}", "directory": "."}}"#);
            assert_eq!(extract_tool_call(&text).unwrap().name, "fileSearchTool", "{op}");
        }
        let listed = extract_tool_call(r#"{"operation":"listDirectories","filePath":"."}"#);
        assert_eq!(listed.unwrap().name, "fileSystemTool");
    }

    #[test]
    fn routes_commands_to_shell() {
        let call = repair(r#"Run this: {"command": "git status"}"#).unwrap();
        assert_eq!(call.name, "bashExecutorTool");
    }

    #[test]
    fn unsupported_operation_is_not_repaired() {
        assert!(extract_tool_call(r#"{"operation": "delete", "filePath": "/"}"#).is_none());
    }

    #[test]
    fn invalid_json_is_not_repaired() {
        assert!(extract_tool_call(r#"{"operation": read, filePath: x}"#).is_none());
        assert!(extract_tool_call("no json here").is_none());
    }

    #[test]
    fn repair_requires_detection() {
        // Extraction alone would succeed, detection would not
        assert!(extract_tool_call(r#"{"filePath": "a", "command": "ls"}"#).is_some());
        assert!(repair(r#"{"filePath": "a", "command": "ls"}"#).is_none());
    }

    #[test]
    fn ids_are_unique() {
        let text = r#"{"command": "pwd"}"#;
        assert_ne!(repair(text).unwrap().id, repair(text).unwrap().id);
    }
}
