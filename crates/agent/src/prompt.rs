//! System prompt construction.
//!
//! A configured prompt replaces the built-in one entirely. The built-in
//! prompt lists the registered tools with a one-line argument example each,
//! which local models need far more than hosted ones.

use crate::session::TERMINATION_KEYWORD;
use ferrule_core::provider::ToolDefinition;

const PREAMBLE: &str = "You are a helpful AI assistant working in the user's terminal.\n\
Solve tasks step by step using your coding and language skills and the tools below.\n\
By default you are in the current working directory; each prompt starts with it as \
`[cwd: <dir>]`. Relative paths resolve against it.";

/// Example arguments shown for the built-in tools.
fn example_for(name: &str) -> Option<&'static str> {
    match name {
        "fileSystemTool" => Some(r#"{ "operation": "read", "filePath": "/path/to/file" }"#),
        "fileSearchTool" => {
            Some(r#"{ "operation": "grep", "directory": "/path/to/project", "pattern": "TODO" }"#)
        }
        "bashExecutorTool" => Some(r#"{ "command": "ls -la", "timeout": 30000 }"#),
        "dependencyAnalysisTool" => Some(r#"{ "projectPath": "/path/to/project" }"#),
        _ => None,
    }
}

/// Build the system prompt for a session.
pub fn system_prompt(configured: Option<&str>, tools: &[ToolDefinition]) -> String {
    if let Some(custom) = configured.filter(|p| !p.trim().is_empty()) {
        return custom.to_string();
    }

    let mut prompt = String::from(PREAMBLE);
    if !tools.is_empty() {
        prompt.push_str("\n\nYou have access to the following tools:\n");
        for (i, tool) in tools.iter().enumerate() {
            prompt.push_str(&format!("{}. {}: {}\n", i + 1, tool.name, tool.description));
            if let Some(example) = example_for(&tool.name) {
                prompt.push_str(&format!("   Example arguments: {example}\n"));
            }
        }
        prompt.push_str(
            "Call tools through the function-calling interface using these exact names.\n",
        );
    }
    prompt.push_str(&format!(
        "\nWhen you find an answer, verify it carefully. Reply \"{TERMINATION_KEYWORD}\" at the end \
         when everything is done."
    ));
    prompt
}
