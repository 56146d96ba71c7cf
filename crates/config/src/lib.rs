//! Configuration loading, validation, and management for Ferrule.
//!
//! Loads configuration from `~/.ferrule/config.toml` with environment
//! variable overrides. Command-line flags are applied on top by the binary,
//! which then calls [`AppConfig::validate`] before anything touches the
//! network: a bad dialect or a missing key must stop the process before the
//! conversation loop starts.

use ferrule_core::provider::ApiType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// The root configuration structure.
///
/// Maps directly to `~/.ferrule/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend dialect: "hosted" or "local-compatible"
    #[serde(default = "default_api_type")]
    pub api_type: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API key (required by the hosted dialect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Endpoint override, mostly for local servers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Conversation loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Tool executor settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_api_type() -> String {
    "local-compatible".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_type", &self.api_type)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Whether the session prompts for another human turn after a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Wait for the next prompt after every response
    #[default]
    Always,
    /// Answer the initial prompt, then end the session
    Never,
}

impl FromStr for InputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(ConfigError::ValidationError(format!(
                "input_mode must be 'always' or 'never', got '{other}'"
            ))),
        }
    }
}

/// What happens to a tool call reconstructed from plain model text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairPolicy {
    /// Never inspect text for pseudo tool calls
    Off,
    /// Report repaired calls but do not execute them
    Advisory,
    /// Execute repaired calls like any gateway-issued call
    #[default]
    Dispatch,
}

impl FromStr for RepairPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "advisory" => Ok(Self::Advisory),
            "dispatch" => Ok(Self::Dispatch),
            other => Err(ConfigError::ValidationError(format!(
                "repair must be 'off', 'advisory' or 'dispatch', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub input_mode: InputMode,

    #[serde(default)]
    pub repair: RepairPolicy,

    /// Cap on model round trips per turn. Absent = unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,

    /// Prefix each prompt with the current working directory
    #[serde(default = "default_true")]
    pub prefix_cwd: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            input_mode: InputMode::default(),
            repair: RepairPolicy::default(),
            max_rounds: None,
            prefix_cwd: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default shell timeout when the call does not pass one
    #[serde(default = "default_shell_timeout_ms")]
    pub shell_timeout_ms: u64,

    /// Default cap on search results
    #[serde(default = "default_search_max_results")]
    pub search_max_results: usize,
}

fn default_shell_timeout_ms() -> u64 {
    30_000
}
fn default_search_max_results() -> usize {
    1000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_ms: default_shell_timeout_ms(),
            search_max_results: default_search_max_results(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ferrule/config.toml)
    /// and apply environment overrides:
    /// - `FERRULE_API_KEY`, then `OPENAI_API_KEY` (only when no key is set)
    /// - `FERRULE_API_TYPE`
    /// - `FERRULE_MODEL`
    /// - `FERRULE_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate_ranges()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("FERRULE_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(api_type) = lookup("FERRULE_API_TYPE") {
            self.api_type = api_type;
        }
        if let Some(model) = lookup("FERRULE_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = lookup("FERRULE_BASE_URL") {
            self.base_url = Some(base_url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ferrule")
    }

    /// The selected dialect.
    pub fn api_type(&self) -> Result<ApiType, ConfigError> {
        self.api_type
            .parse::<ApiType>()
            .map_err(|_| ConfigError::UnsupportedApiType(self.api_type.clone()))
    }

    /// Full validation, run once every override has been applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_ranges()?;

        let api_type = self.api_type()?;
        let has_key = self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty());
        if api_type.requires_credentials() && !has_key {
            return Err(ConfigError::MissingCredentials(format!(
                "the {api_type} dialect needs an API key (set FERRULE_API_KEY or OPENAI_API_KEY)"
            )));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        Ok(())
    }

    fn validate_ranges(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.tools.shell_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tools.shell_timeout_ms must be > 0".into(),
            ));
        }

        if self.agent.max_rounds == Some(0) {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be > 0 when set".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_type: default_api_type(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
pub fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unsupported API type '{0}' (expected 'hosted' or 'local-compatible')")]
    UnsupportedApiType(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.api_type().unwrap(), ApiType::LocalCompatible);
        assert_eq!(config.agent.input_mode, InputMode::Always);
        assert_eq!(config.agent.repair, RepairPolicy::Dispatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.api_type, config.api_type);
        assert_eq!(parsed.tools.shell_timeout_ms, 30_000);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_dialect_rejected() {
        let config = AppConfig {
            api_type: "azure".into(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnsupportedApiType(ref t)) if t == "azure"
        ));
    }

    #[test]
    fn hosted_without_key_rejected() {
        let config = AppConfig {
            api_type: "hosted".into(),
            model: "gpt-4o-mini".into(),
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingCredentials(_))));

        let with_key = AppConfig {
            api_key: Some("sk-test".into()),
            ..config
        };
        assert!(with_key.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().model, "llama3.2");
    }

    #[test]
    fn load_from_file_with_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_type = "hosted"
model = "gpt-4o-mini"
api_key = "sk-file"

[agent]
input_mode = "never"
repair = "advisory"
max_rounds = 8

[tools]
shell_timeout_ms = 5000
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_type().unwrap(), ApiType::Hosted);
        assert_eq!(config.agent.input_mode, InputMode::Never);
        assert_eq!(config.agent.repair, RepairPolicy::Advisory);
        assert_eq!(config.agent.max_rounds, Some(8));
        assert!(config.agent.prefix_cwd);
        assert_eq!(config.tools.shell_timeout_ms, 5000);
        assert_eq!(config.tools.search_max_results, 1000);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_type = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENAI_API_KEY", "sk-env"),
            ("FERRULE_API_TYPE", "hosted"),
            ("FERRULE_MODEL", "gpt-4o"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.api_type, "hosted");
        assert_eq!(config.model, "gpt-4o");
        assert!(config.base_url.is_none());
    }

    #[test]
    fn file_key_wins_over_env_key() {
        let mut config = AppConfig {
            api_key: Some("sk-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| (k == "FERRULE_API_KEY").then(|| "sk-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn policies_parse_from_flags() {
        assert_eq!("NEVER".parse::<InputMode>().unwrap(), InputMode::Never);
        assert_eq!("off".parse::<RepairPolicy>().unwrap(), RepairPolicy::Off);
        assert!("sometimes".parse::<InputMode>().is_err());
    }
}
