//! File system tool — read, write and delete files and directories.

use crate::resolve_path;
use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolResult};
use std::path::Path;
use tracing::debug;

const OPERATIONS: &[&str] = &[
    "read",
    "create",
    "update",
    "delete",
    "createDirectory",
    "deleteDirectory",
    "listDirectories",
];

/// `fileSystemTool`: one tool, several operations selected by `operation`.
pub struct FileSystemTool;

impl FileSystemTool {
    async fn run(operation: &str, path: &Path, content: &str) -> std::io::Result<String> {
        let shown = path.display();
        match operation {
            "read" => {
                let data = tokio::fs::read_to_string(path).await?;
                Ok(format!("File content: {data}"))
            }
            "create" => {
                create_parent(path).await?;
                tokio::fs::write(path, content).await?;
                Ok(format!("File {shown} created."))
            }
            "update" => {
                tokio::fs::write(path, content).await?;
                Ok(format!("File {shown} updated."))
            }
            "delete" => {
                tokio::fs::remove_file(path).await?;
                Ok(format!("File {shown} deleted."))
            }
            "createDirectory" => {
                tokio::fs::create_dir_all(path).await?;
                Ok(format!("Directory {shown} created."))
            }
            "deleteDirectory" => {
                match tokio::fs::remove_dir_all(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
                Ok(format!("Directory {shown} deleted."))
            }
            "listDirectories" => {
                let mut entries = tokio::fs::read_dir(path).await?;
                let mut dirs = Vec::new();
                while let Some(entry) = entries.next_entry().await? {
                    if entry.file_type().await?.is_dir() {
                        dirs.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                dirs.sort();
                Ok(format!("Directories in {shown}: {}", dirs.join(", ")))
            }
            other => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unsupported operation '{other}'"),
            )),
        }
    }
}

async fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent).await,
        _ => Ok(()),
    }
}

#[async_trait]
impl Tool for FileSystemTool {
    fn name(&self) -> &str {
        "fileSystemTool"
    }

    fn description(&self) -> &str {
        "Read, create, update and delete files, create or delete directories, and list the \
         sub-directories of a directory. Relative paths are resolved against the current \
         working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": OPERATIONS,
                    "description": "The operation to perform"
                },
                "filePath": {
                    "type": "string",
                    "description": "Path of the file or directory"
                },
                "content": {
                    "type": "string",
                    "description": "File content for 'create' and 'update'"
                }
            },
            "required": ["operation", "filePath"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let operation = arguments["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;
        let raw_path = arguments["filePath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'filePath' argument".into()))?;
        let content = arguments["content"].as_str().unwrap_or_default();

        let path = resolve_path(raw_path);
        debug!(operation, path = %path.display(), "File system operation");

        match Self::run(operation, &path, content).await {
            Ok(output) => Ok(ToolResult::ok(output)),
            Err(e) => Ok(ToolResult::error(format!(
                "Error during '{operation}' on {}: {e}",
                path.display()
            ))),
        }
    }
}
