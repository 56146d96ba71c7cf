//! File search tool — find files by name, grep contents, explore a project.

use crate::resolve_path;
use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolResult};
use ignore::WalkBuilder;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories skipped unless the call passes its own `ignoreDirs`.
pub const DEFAULT_IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    "coverage",
    ".next",
    ".cache",
    ".vscode",
    ".idea",
    "target",
];

const KEY_PROJECT_FILES: &[&str] = &[
    "README.md",
    "package.json",
    "tsconfig.json",
    "webpack.config.js",
    "vite.config.js",
    ".env.example",
    "docker-compose.yml",
    "Dockerfile",
    "requirements.txt",
    "setup.py",
    "pom.xml",
    "build.gradle",
    "go.mod",
    "Cargo.toml",
    "composer.json",
    "Gemfile",
];

const FILE_CATEGORIES: &[(&str, &[&str])] = &[
    ("javascript", &[".js", ".jsx", ".ts", ".tsx"]),
    ("python", &[".py", ".pyx", ".ipynb"]),
    ("rust", &[".rs"]),
    ("web", &[".html", ".css", ".scss", ".sass"]),
    ("config", &[".json", ".yaml", ".yml", ".toml", ".ini", ".conf"]),
    ("documentation", &[".md", ".txt", ".rst", ".adoc"]),
    ("data", &[".csv", ".xml", ".sql"]),
    (
        "misc",
        &[
            ".sh", ".bat", ".ps1", ".rb", ".php", ".go", ".java", ".kt", ".c", ".cpp", ".h",
            ".hpp",
        ],
    ),
];

/// Indicator file (or directory) name → frameworks it hints at.
const FRAMEWORK_INDICATORS: &[(&str, &[&str])] = &[
    ("package.json", &["react", "vue", "angular", "next", "express", "nestjs", "koa"]),
    ("vite.config.js", &["vue", "react"]),
    ("next.config.js", &["nextjs"]),
    ("angular.json", &["angular"]),
    ("nuxt.config.js", &["nuxt"]),
    ("django", &["django"]),
    ("requirements.txt", &["flask", "django", "fastapi"]),
    ("pom.xml", &["spring"]),
    ("build.gradle", &["spring", "android"]),
    ("go.mod", &["gin", "echo"]),
    ("Cargo.toml", &["tokio", "axum", "actix"]),
    ("composer.json", &["laravel", "symfony"]),
    ("Gemfile", &["rails"]),
];

const KEY_FILE_LIMIT: usize = 5000;
const TREE_DEPTH: usize = 2;

/// `fileSearchTool`: name search, content search and project overview.
pub struct FileSearchTool {
    default_max_results: usize,
}

impl FileSearchTool {
    pub fn new(default_max_results: usize) -> Self {
        Self {
            default_max_results,
        }
    }
}

impl Default for FileSearchTool {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Walk options taken from the call arguments.
struct Walk {
    root: PathBuf,
    recursive: bool,
    ignore_dirs: Vec<String>,
}

impl Walk {
    /// Every regular file under the root, skipping ignored directories.
    /// Unreadable directories are skipped silently.
    fn files(&self) -> Vec<PathBuf> {
        let ignore_dirs = self.ignore_dirs.clone();
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .max_depth(if self.recursive { None } else { Some(1) })
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
                !(is_dir
                    && entry.depth() > 0
                    && ignore_dirs
                        .iter()
                        .any(|d| entry.file_name().to_string_lossy() == d.as_str()))
            });

        builder
            .build()
            .flatten()
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .collect()
    }

    async fn files_async(self) -> Result<Vec<PathBuf>, ToolError> {
        tokio::task::spawn_blocking(move || self.files())
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "fileSearchTool".into(),
                reason: e.to_string(),
            })
    }
}

fn find(files: &[PathBuf], pattern: &str, max_results: usize) -> Vec<String> {
    let needle = pattern.to_lowercase();
    files
        .iter()
        .filter(|path| {
            path.file_name()
                .is_some_and(|n| n.to_string_lossy().to_lowercase().contains(&needle))
        })
        .take(max_results)
        .map(|path| path.display().to_string())
        .collect()
}

async fn grep(files: &[PathBuf], pattern: &str, max_results: usize) -> Vec<String> {
    let needle = pattern.to_lowercase();
    let mut hits = Vec::new();
    for path in files {
        // Binary and unreadable files are skipped
        let Ok(content) = tokio::fs::read_to_string(path).await else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if line.to_lowercase().contains(&needle) {
                hits.push(format!("{} [line {}]: {line}", path.display(), idx + 1));
                if hits.len() >= max_results {
                    return hits;
                }
            }
        }
    }
    hits
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
}

/// Categories ordered by how many files they cover, largest first.
fn detect_languages(extensions: &BTreeMap<String, usize>) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = FILE_CATEGORIES
        .iter()
        .map(|(category, exts)| {
            let n = exts.iter().map(|e| extensions.get(*e).copied().unwrap_or(0)).sum();
            (*category, n)
        })
        .filter(|(_, n)| *n > 0)
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(c, _)| c.to_string()).collect()
}

fn detect_frameworks(files: &[PathBuf]) -> Vec<String> {
    let mut found = BTreeSet::new();
    for file in files {
        let base = file.file_name().map(|n| n.to_string_lossy().into_owned());
        let parent = file
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned());
        for (indicator, frameworks) in FRAMEWORK_INDICATORS {
            if base.as_deref() == Some(*indicator) || parent.as_deref() == Some(*indicator) {
                found.extend(frameworks.iter().map(|f| f.to_string()));
            }
        }
    }
    found.into_iter().collect()
}

/// Nested map of relative path components; files map to `null`.
#[derive(Default)]
struct DirTree {
    children: BTreeMap<String, Option<DirTree>>,
}

impl DirTree {
    /// Insert a relative file path, returning how many new directories it created.
    fn insert(&mut self, parts: &[String]) -> usize {
        let Some((file, dirs)) = parts.split_last() else {
            return 0;
        };
        let mut created = 0;
        let mut node = self;
        for dir in dirs {
            let slot = node.children.entry(dir.clone()).or_insert_with(|| {
                created += 1;
                Some(DirTree::default())
            });
            node = match slot {
                Some(tree) => tree,
                None => return created,
            };
        }
        node.children.insert(file.clone(), None);
        created
    }

    fn summarize(&self, depth: usize) -> Value {
        if depth >= TREE_DEPTH {
            return if self.children.is_empty() {
                json!({})
            } else {
                json!(format!("{} files/directories", self.children.len()))
            };
        }
        let mut out = Map::new();
        for (name, child) in &self.children {
            let value = match child {
                Some(tree) => tree.summarize(depth + 1),
                None => Value::Null,
            };
            out.insert(name.clone(), value);
        }
        Value::Object(out)
    }
}

async fn explore(root: &Path, files: &[PathBuf]) -> Value {
    let mut tree = DirTree::default();
    let mut directory_count = 0;
    let mut extensions: BTreeMap<String, usize> = BTreeMap::new();

    for file in files {
        let Ok(rel) = file.strip_prefix(root) else {
            continue;
        };
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        directory_count += tree.insert(&parts);
        if let Some(ext) = extension_of(file) {
            *extensions.entry(ext).or_default() += 1;
        }
    }

    let mut key_files = Map::new();
    for key in KEY_PROJECT_FILES {
        let Some(path) = files.iter().find(|f| {
            f.file_name()
                .is_some_and(|n| n.to_string_lossy().eq_ignore_ascii_case(key))
        }) else {
            continue;
        };
        let entry = match tokio::fs::read_to_string(path).await {
            Ok(content) => json!({
                "path": path.display().to_string(),
                "content": truncate(&content, KEY_FILE_LIMIT),
            }),
            Err(_) => json!({
                "path": path.display().to_string(),
                "error": "Unable to read file",
            }),
        };
        key_files.insert(key.to_string(), entry);
    }

    let languages = detect_languages(&extensions);
    let frameworks = detect_frameworks(files);

    let summary = [
        format!("Project located at: {}", root.display()),
        format!("Number of files: {}", files.len()),
        format!("Number of directories: {directory_count}"),
        format!("Main languages: {}", languages.join(", ")),
        format!(
            "Potential frameworks: {}",
            if frameworks.is_empty() {
                "None detected".to_string()
            } else {
                frameworks.join(", ")
            }
        ),
        format!(
            "Key files found: {}",
            key_files.keys().cloned().collect::<Vec<_>>().join(", ")
        ),
    ]
    .join("\n");

    json!({
        "rootDirectory": root.display().to_string(),
        "fileCount": files.len(),
        "directoryCount": directory_count,
        "extensions": extensions,
        "languages": languages,
        "frameworks": frameworks,
        "keyFiles": key_files,
        "directoryStructure": tree.summarize(0),
        "summary": summary,
    })
}

fn truncate(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[async_trait]
impl Tool for FileSearchTool {
    fn name(&self) -> &str {
        "fileSearchTool"
    }

    fn description(&self) -> &str {
        "Search a directory tree. 'find' matches file names, 'grep' matches file contents \
         (both case-insensitive), 'exploreProject' summarizes the project structure, \
         languages, frameworks and key files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["find", "grep", "exploreProject"],
                    "description": "The search to run"
                },
                "directory": {
                    "type": "string",
                    "description": "Directory to search in"
                },
                "pattern": {
                    "type": "string",
                    "description": "Substring to look for (required for 'find' and 'grep')"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Descend into sub-directories (default true)"
                },
                "ignoreDirs": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Directory names to skip"
                },
                "maxResults": {
                    "type": "integer",
                    "description": "Maximum number of results"
                }
            },
            "required": ["operation", "directory"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let operation = arguments["operation"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;
        let directory = arguments["directory"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'directory' argument".into()))?;
        let pattern = arguments["pattern"].as_str().map(str::trim).unwrap_or_default();

        if operation != "exploreProject" && pattern.is_empty() {
            return Ok(ToolResult::error(
                "Error: 'pattern' is required for 'find' and 'grep' and must be a non-empty string.",
            ));
        }

        let root = resolve_path(directory);
        if !root.is_dir() {
            return Ok(ToolResult::error(format!(
                "Error: directory \"{}\" does not exist or is not accessible.",
                root.display()
            )));
        }

        let ignore_dirs = match arguments["ignoreDirs"].as_array() {
            Some(list) => list
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            None => DEFAULT_IGNORE_DIRS.iter().map(|d| d.to_string()).collect(),
        };
        let max_results = arguments["maxResults"]
            .as_u64()
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .unwrap_or(self.default_max_results);
        let recursive = operation == "exploreProject" || arguments["recursive"].as_bool() != Some(false);

        debug!(operation, root = %root.display(), recursive, max_results, "File search");

        let files = Walk {
            root: root.clone(),
            recursive,
            ignore_dirs,
        }
        .files_async()
        .await?;

        let root_shown = root.display().to_string();
        let payload = match operation {
            "find" => {
                let hits = find(&files, pattern, max_results);
                json!({
                    "status": "success",
                    "operation": "find",
                    "directory": root_shown,
                    "files": if hits.is_empty() { json!("No matching files.") } else { json!(hits) },
                })
            }
            "grep" => {
                let hits = grep(&files, pattern, max_results).await;
                json!({
                    "status": "success",
                    "operation": "grep",
                    "directory": root_shown,
                    "occurrences": if hits.is_empty() { json!("No occurrences found.") } else { json!(hits) },
                })
            }
            "exploreProject" => explore(&root, &files).await,
            other => {
                return Ok(ToolResult::error(format!(
                    "Error: unsupported operation '{other}'. Use 'find', 'grep' or 'exploreProject'."
                )));
            }
        };

        Ok(ToolResult::ok(pretty(&payload)).with_data(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/utils")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        std::fs::write(root.join("package.json"), r#"{"name":"demo"}"#).unwrap();
        std::fs::write(root.join("README.md"), "# Demo\nA TODO list app").unwrap();
        std::fs::write(root.join("src/index.ts"), "const x = 1;\n// todo: refactor\n").unwrap();
        std::fs::write(root.join("src/utils/format.ts"), "export const fmt = 1;\n").unwrap();
        std::fs::write(root.join("node_modules/lib/index.js"), "todo").unwrap();
        dir
    }

    fn search(operation: &str, dir: &Path, pattern: &str) -> Value {
        json!({
            "operation": operation,
            "directory": dir.to_string_lossy(),
            "pattern": pattern,
        })
    }

    #[tokio::test]
    async fn find_matches_file_names_case_insensitively() {
        let dir = project();
        let result = FileSearchTool::default()
            .execute(search("find", dir.path(), "INDEX"))
            .await
            .unwrap();
        assert!(result.success);
        let data = result.data.unwrap();
        let files = data["files"].as_array().unwrap();
        assert_eq!(files.len(), 1, "node_modules must be skipped");
        assert!(files[0].as_str().unwrap().ends_with("index.ts"));
    }

    #[tokio::test]
    async fn find_without_matches_reports_none() {
        let dir = project();
        let result = FileSearchTool::default()
            .execute(search("find", dir.path(), "nothing-here"))
            .await
            .unwrap();
        assert_eq!(result.data.unwrap()["files"], "No matching files.");
    }

    #[tokio::test]
    async fn grep_reports_line_numbers() {
        let dir = project();
        let result = FileSearchTool::default()
            .execute(search("grep", dir.path(), "todo"))
            .await
            .unwrap();
        let data = result.data.unwrap();
        let hits: Vec<&str> = data["occurrences"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|h| h.ends_with("README.md [line 2]: A TODO list app")));
        assert!(hits.iter().any(|h| h.contains("index.ts [line 2]")));
    }

    #[tokio::test]
    async fn max_results_caps_output() {
        let dir = project();
        let mut args = search("grep", dir.path(), "todo");
        args["maxResults"] = json!(1);
        let result = FileSearchTool::default().execute(args).await.unwrap();
        assert_eq!(result.data.unwrap()["occurrences"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_recursive_search_stays_at_top_level() {
        let dir = project();
        let mut args = search("find", dir.path(), ".ts");
        args["recursive"] = json!(false);
        let result = FileSearchTool::default().execute(args).await.unwrap();
        assert_eq!(result.data.unwrap()["files"], "No matching files.");
    }

    #[tokio::test]
    async fn custom_ignore_dirs_replace_defaults() {
        let dir = project();
        let mut args = search("find", dir.path(), "index");
        args["ignoreDirs"] = json!(["src"]);
        let result = FileSearchTool::default().execute(args).await.unwrap();
        let data = result.data.unwrap();
        let files = data["files"].as_array().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].as_str().unwrap().contains("node_modules"));
    }

    #[tokio::test]
    async fn pattern_is_required_for_find() {
        let dir = project();
        let result = FileSearchTool::default()
            .execute(search("find", dir.path(), "  "))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("'pattern' is required"));
    }

    #[tokio::test]
    async fn missing_directory_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let result = FileSearchTool::default()
            .execute(search("find", &dir.path().join("nope"), "x"))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("does not exist"));
    }

    #[tokio::test]
    async fn explore_project_summarizes_structure() {
        let dir = project();
        let args = json!({"operation": "exploreProject", "directory": dir.path().to_string_lossy()});
        let result = FileSearchTool::default().execute(args).await.unwrap();
        let data = result.data.unwrap();

        assert_eq!(data["fileCount"], 4);
        assert_eq!(data["directoryCount"], 2);
        assert_eq!(data["extensions"][".ts"], 2);
        assert_eq!(data["languages"][0], "javascript");
        assert!(data["frameworks"].as_array().unwrap().contains(&json!("react")));
        assert_eq!(data["keyFiles"]["package.json"]["content"], r#"{"name":"demo"}"#);
        assert!(data["directoryStructure"]["src"]["index.ts"].is_null());
        assert_eq!(data["directoryStructure"]["src"]["utils"], "1 files/directories");
        assert!(data["summary"].as_str().unwrap().contains("Number of files: 4"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("short", 10), "short");
    }
}
