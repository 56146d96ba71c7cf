//! Dependency analysis tool — report a project's declared dependencies.
//!
//! Understands `package.json`, `requirements.txt`, `Cargo.toml` and
//! `go.mod`; Maven, Gradle, Composer and Bundler projects are recognised
//! but only reported by type.

use crate::resolve_path;
use async_trait::async_trait;
use ferrule_core::error::ToolError;
use ferrule_core::tool::{Tool, ToolResult};
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::debug;

/// Manifest probed in order; the first one present decides the project type.
const MANIFESTS: &[(&str, &str)] = &[
    ("package.json", "Node.js/JavaScript"),
    ("requirements.txt", "Python"),
    ("Cargo.toml", "Rust"),
    ("go.mod", "Go"),
    ("pom.xml", "Java (Maven)"),
    ("build.gradle", "Java/Kotlin (Gradle)"),
    ("composer.json", "PHP"),
    ("Gemfile", "Ruby"),
];

const NODE_TECHS: &[(&str, &str)] = &[
    ("react", "React"),
    ("react-dom", "React DOM"),
    ("vue", "Vue.js"),
    ("@angular/core", "Angular"),
    ("next", "Next.js"),
    ("nuxt", "Nuxt.js"),
    ("express", "Express.js"),
    ("koa", "Koa.js"),
    ("@nestjs/core", "NestJS"),
    ("electron", "Electron"),
];

const PYTHON_TECHS: &[(&str, &str)] = &[
    ("django", "Django"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("streamlit", "Streamlit"),
    ("numpy", "NumPy"),
    ("pandas", "Pandas"),
    ("tensorflow", "TensorFlow"),
    ("torch", "PyTorch"),
];

const RUST_TECHS: &[(&str, &str)] = &[
    ("tokio", "Tokio"),
    ("axum", "Axum"),
    ("actix-web", "Actix Web"),
    ("serde", "Serde"),
    ("clap", "Clap"),
    ("reqwest", "Reqwest"),
];

/// Analysis of one manifest.
#[derive(Debug, Default)]
struct Report {
    project_name: Option<String>,
    project_version: Option<String>,
    dependencies: Map<String, Value>,
    dev_dependencies: Option<Map<String, Value>>,
    technologies: Vec<String>,
}

impl Report {
    fn detect(&mut self, table: &[(&str, &str)]) {
        self.technologies = table
            .iter()
            .filter(|(dep, _)| self.dependencies.contains_key(*dep))
            .map(|(_, tech)| tech.to_string())
            .collect();
    }
}

fn string_map(value: Option<&Value>) -> Map<String, Value> {
    value.and_then(Value::as_object).cloned().unwrap_or_default()
}

fn analyze_node(text: &str, include_dev: bool) -> Result<Report, String> {
    let manifest: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    let mut report = Report {
        project_name: manifest["name"].as_str().map(String::from),
        project_version: manifest["version"].as_str().map(String::from),
        dependencies: string_map(manifest.get("dependencies")),
        dev_dependencies: include_dev.then(|| string_map(manifest.get("devDependencies"))),
        ..Report::default()
    };
    report.detect(NODE_TECHS);
    Ok(report)
}

fn analyze_python(text: &str) -> Report {
    let mut report = Report::default();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (name, version) = match line.split_once("==") {
            Some((n, v)) => (n.trim(), v.trim()),
            None => (line, "latest"),
        };
        report.dependencies.insert(name.to_string(), json!(version));
    }
    report.detect(PYTHON_TECHS);
    report
}

/// `version = "1"` and `{ version = "1", ... }` both report the version;
/// path and git dependencies report their source.
fn cargo_requirement(spec: &toml::Value) -> Value {
    match spec {
        toml::Value::String(v) => json!(v),
        toml::Value::Table(t) => {
            if let Some(v) = t.get("version").and_then(toml::Value::as_str) {
                json!(v)
            } else if let Some(p) = t.get("path").and_then(toml::Value::as_str) {
                json!(format!("path:{p}"))
            } else if let Some(g) = t.get("git").and_then(toml::Value::as_str) {
                json!(format!("git:{g}"))
            } else if t.get("workspace").and_then(toml::Value::as_bool) == Some(true) {
                json!("workspace")
            } else {
                json!("*")
            }
        }
        other => json!(other.to_string()),
    }
}

fn cargo_table(manifest: &toml::Value, key: &str) -> Map<String, Value> {
    manifest
        .get(key)
        .and_then(toml::Value::as_table)
        .map(|deps| {
            deps.iter()
                .map(|(name, spec)| (name.clone(), cargo_requirement(spec)))
                .collect()
        })
        .unwrap_or_default()
}

fn analyze_cargo(text: &str, include_dev: bool) -> Result<Report, String> {
    let manifest: toml::Value = toml::from_str(text).map_err(|e| e.to_string())?;
    let package = manifest.get("package");
    let field = |key: &str| {
        package
            .and_then(|p| p.get(key))
            .and_then(toml::Value::as_str)
            .map(String::from)
    };

    let mut dependencies = cargo_table(&manifest, "dependencies");
    if dependencies.is_empty() {
        // Virtual workspace manifests declare shared versions instead
        if let Some(ws) = manifest.get("workspace") {
            dependencies = cargo_table(ws, "dependencies");
        }
    }

    let mut report = Report {
        project_name: field("name"),
        project_version: field("version"),
        dependencies,
        dev_dependencies: include_dev.then(|| cargo_table(&manifest, "dev-dependencies")),
        ..Report::default()
    };
    report.detect(RUST_TECHS);
    Ok(report)
}

fn analyze_go(text: &str) -> Report {
    let mut report = Report::default();
    let mut in_block = false;
    for line in text.lines().map(str::trim) {
        if let Some(module) = line.strip_prefix("module ") {
            report.project_name = Some(module.trim().to_string());
            continue;
        }
        let entry = if in_block {
            if line == ")" {
                in_block = false;
                continue;
            }
            line
        } else if line == "require (" {
            in_block = true;
            continue;
        } else if let Some(single) = line.strip_prefix("require ") {
            single
        } else {
            continue;
        };

        let entry = entry.split("//").next().unwrap_or_default().trim();
        if let Some((name, version)) = entry.split_once(char::is_whitespace) {
            report.dependencies.insert(name.to_string(), json!(version.trim()));
        }
    }
    report
}

/// `dependencyAnalysisTool`: summarize what a project depends on.
pub struct DependencyAnalysisTool;

impl DependencyAnalysisTool {
    async fn analyze(root: &Path, include_dev: bool) -> Result<Value, String> {
        let mut detected = None;
        for (manifest, project_type) in MANIFESTS {
            if tokio::fs::try_exists(root.join(manifest)).await.unwrap_or(false) {
                detected = Some((*manifest, *project_type));
                break;
            }
        }

        let Some((manifest, project_type)) = detected else {
            return Ok(json!({
                "projectPath": root.display().to_string(),
                "dependencies": {},
                "summary": "No recognised dependency manifest found in this project.",
            }));
        };

        let path = root.join(manifest);
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;

        let report = match manifest {
            "package.json" => analyze_node(&text, include_dev)?,
            "requirements.txt" => analyze_python(&text),
            "Cargo.toml" => analyze_cargo(&text, include_dev)?,
            "go.mod" => analyze_go(&text),
            _ => {
                return Ok(json!({
                    "projectPath": root.display().to_string(),
                    "projectType": project_type,
                    "manifest": manifest,
                    "dependencies": {},
                    "summary": format!("{project_type} project detected ({manifest}); dependency listing is not supported for this manifest."),
                }));
            }
        };

        let mut summary = vec![
            format!(
                "Project {} (v{})",
                report.project_name.as_deref().unwrap_or("N/A"),
                report.project_version.as_deref().unwrap_or("N/A")
            ),
            format!("Type: {project_type}"),
            format!("Dependencies: {}", report.dependencies.len()),
        ];
        if let Some(dev) = &report.dev_dependencies {
            summary.push(format!("Dev dependencies: {}", dev.len()));
        }
        summary.push(format!(
            "Detected technologies: {}",
            if report.technologies.is_empty() {
                "none".to_string()
            } else {
                report.technologies.join(", ")
            }
        ));

        let mut out = json!({
            "projectPath": root.display().to_string(),
            "projectType": project_type,
            "manifest": manifest,
            "projectName": report.project_name,
            "projectVersion": report.project_version,
            "dependencies": report.dependencies,
            "detectedTechnologies": report.technologies,
            "summary": summary.join("\n"),
        });
        if let Some(dev) = report.dev_dependencies {
            out["devDependencies"] = Value::Object(dev);
        }
        if manifest == "requirements.txt" {
            out["hasSetupPy"] = json!(
                tokio::fs::try_exists(root.join("setup.py")).await.unwrap_or(false)
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl Tool for DependencyAnalysisTool {
    fn name(&self) -> &str {
        "dependencyAnalysisTool"
    }

    fn description(&self) -> &str {
        "Analyze a project's dependency manifest (package.json, requirements.txt, Cargo.toml, \
         go.mod) and report its dependencies and detected technologies."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "projectPath": {
                    "type": "string",
                    "description": "Root directory of the project"
                },
                "includeDevDependencies": {
                    "type": "boolean",
                    "description": "Include development dependencies (default true)"
                }
            },
            "required": ["projectPath"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let project_path = arguments["projectPath"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'projectPath' argument".into()))?;
        let include_dev = arguments["includeDevDependencies"].as_bool() != Some(false);

        let root = resolve_path(project_path);
        debug!(root = %root.display(), include_dev, "Analyzing dependencies");

        match Self::analyze(&root, include_dev).await {
            Ok(report) => {
                let text =
                    serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string());
                Ok(ToolResult::ok(text).with_data(report))
            }
            Err(reason) => Ok(ToolResult::error(format!(
                "Error while analyzing dependencies of {}: {reason}",
                root.display()
            ))),
        }
    }
}
