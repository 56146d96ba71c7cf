//! Built-in tool executors for Ferrule.
//!
//! Tools give the agent the ability to act on the machine it runs on:
//! read and write files, search a project tree, run shell commands and
//! summarize a project's dependencies.
//!
//! Tool names are part of the prompt contract with the model, so they are
//! fixed camelCase identifiers rather than Rust-style names.

pub mod dependency_analysis;
pub mod file_search;
pub mod file_system;
pub mod shell;

use ferrule_core::error::ToolError;
use ferrule_core::tool::ToolRegistry;
use std::path::PathBuf;

pub use dependency_analysis::DependencyAnalysisTool;
pub use file_search::FileSearchTool;
pub use file_system::FileSystemTool;
pub use shell::ShellTool;

/// Placeholder some models copy verbatim from the system prompt.
pub const CWD_PLACEHOLDER: &str = "<current working directory>";

/// Settings the built-in tools read at construction.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    /// Default shell timeout when the call does not pass one
    pub shell_timeout_ms: u64,
    /// Default cap on search results
    pub search_max_results: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            shell_timeout_ms: 30_000,
            search_max_results: 1000,
        }
    }
}

/// Create the registry with every built-in tool.
pub fn default_registry(settings: &ToolSettings) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FileSystemTool))?;
    registry.register(Box::new(FileSearchTool::new(settings.search_max_results)))?;
    registry.register(Box::new(ShellTool::new(settings.shell_timeout_ms)))?;
    registry.register(Box::new(DependencyAnalysisTool))?;
    Ok(registry)
}

/// Resolve a model-supplied path: substitute the cwd placeholder, then make
/// relative paths absolute against the process working directory.
pub fn resolve_path(raw: &str) -> PathBuf {
    let expanded = if raw.contains(CWD_PLACEHOLDER) {
        let cwd = std::env::current_dir().unwrap_or_default();
        raw.replace(CWD_PLACEHOLDER, &cwd.to_string_lossy())
    } else {
        raw.to_string()
    };

    let path = PathBuf::from(expanded);
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_all_tools() {
        let registry = default_registry(&ToolSettings::default()).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "fileSystemTool",
                "fileSearchTool",
                "bashExecutorTool",
                "dependencyAnalysisTool"
            ]
        );
    }

    #[test]
    fn resolve_path_expands_placeholder() {
        let cwd = std::env::current_dir().unwrap();
        let resolved = resolve_path("<current working directory>/notes.txt");
        assert_eq!(resolved, cwd.join("notes.txt"));
    }

    #[test]
    fn resolve_path_makes_relative_absolute() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(resolve_path("src/lib.rs"), cwd.join("src/lib.rs"));
        assert_eq!(resolve_path("/tmp/a.txt"), PathBuf::from("/tmp/a.txt"));
    }
}
