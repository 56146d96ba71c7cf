//! Shell tool: execute system commands with a timeout.

use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolResult};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// `bashExecutorTool`: runs a command through the platform shell in the
/// process working directory.
pub struct ShellTool {
    default_timeout_ms: u64,
}

impl ShellTool {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    fn command(command: &str) -> Command {
        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", command]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", command]);
            c
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for ShellTool {
    fn default() -> Self {
        Self::new(30_000)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "bashExecutorTool"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the current working directory and return its stdout, \
         stderr and exit code. Use this for running programs, git operations, builds, etc."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in milliseconds"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'command' must not be empty".into()));
        }
        let timeout_ms = arguments["timeout"]
            .as_u64()
            .filter(|ms| *ms > 0)
            .unwrap_or(self.default_timeout_ms);

        debug!(command = %command, timeout_ms, "Executing shell command");

        let child = Self::command(command)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "bashExecutorTool".into(),
                reason: e.to_string(),
            })?;

        // Dropping the future on timeout kills the child
        let output = match tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "bashExecutorTool".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %command, timeout_ms, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: "bashExecutorTool".into(),
                    timeout_ms,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = output.status.code().unwrap_or(-1);

        let payload = serde_json::json!({
            "stdout": stdout,
            "stderr": stderr,
            "exit_code": exit_code,
        });
        let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());

        if output.status.success() {
            Ok(ToolResult::ok(text).with_data(payload))
        } else {
            warn!(command = %command, exit_code, "Command failed");
            Ok(ToolResult::error(format!(
                "Error: command \"{command}\" exited with code {exit_code}\n{text}"
            ))
            .with_data(payload))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_core::message::ToolCallRequest;
    use ferrule_core::tool::ToolRegistry;

    #[tokio::test]
    async fn execute_echo() {
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["stdout"].as_str().unwrap().trim(), "hello");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pwd_reports_process_cwd() {
        let cwd = std::env::current_dir().unwrap();
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "pwd"}))
            .await
            .unwrap();
        assert!(result.success);
        let stdout = result.data.unwrap()["stdout"].as_str().unwrap().trim().to_string();
        let reported = std::fs::canonicalize(&stdout).unwrap();
        assert_eq!(reported, std::fs::canonicalize(cwd).unwrap());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_error_with_both_streams() {
        let result = ShellTool::default()
            .execute(serde_json::json!({"command": "echo out; echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("exited with code 3"));
        assert!(result.output.contains("out"));
        assert!(result.output.contains("oops"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_becomes_error_result() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(ShellTool::default())).unwrap();

        let call = ToolCallRequest::new(
            "call_1",
            "bashExecutorTool",
            r#"{"command":"sleep 5","timeout":100}"#,
        );
        let result = registry.dispatch(&call).await;
        assert!(!result.success);
        assert_eq!(result.call_id, "call_1");
        assert!(result.output.contains("timed out"));
    }

    #[tokio::test]
    async fn missing_command_is_rejected() {
        let err = ShellTool::default()
            .execute(serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
