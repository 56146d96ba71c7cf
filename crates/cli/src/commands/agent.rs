//! `ferrule agent` — Interactive or single-prompt chat mode.

use crate::terminal::{StdinPrompt, TerminalSink};
use clap::Args;
use ferrule_agent::{AgentRunner, Session, StopReason, TurnOrchestrator, system_prompt};
use ferrule_config::{AppConfig, InputMode, RepairPolicy};
use ferrule_providers::{GatewaySettings, ModelGateway};
use ferrule_tools::{ToolSettings, default_registry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Args)]
pub struct AgentArgs {
    /// Initial prompt; handled exactly like a typed line
    #[arg(short, long)]
    pub message: Option<String>,

    /// Prompt for more input after each answer (`always`) or stop after the first (`never`)
    #[arg(long)]
    pub input_mode: Option<InputMode>,

    /// Backend dialect: `hosted` or `local-compatible`
    #[arg(long)]
    pub api_type: Option<String>,

    /// Model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// Endpoint override
    #[arg(long)]
    pub base_url: Option<String>,

    /// What to do with tool calls written as plain text: `off`, `advisory` or `dispatch`
    #[arg(long)]
    pub repair: Option<RepairPolicy>,
}

/// Layer command-line flags over the loaded configuration.
pub fn apply_overrides(config: &mut AppConfig, args: &AgentArgs) {
    if let Some(mode) = args.input_mode {
        config.agent.input_mode = mode;
    }
    if let Some(api_type) = &args.api_type {
        config.api_type = api_type.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(policy) = args.repair {
        config.agent.repair = policy;
    }
}

/// Gateway settings taken from a validated configuration.
pub fn gateway_settings(config: &AppConfig) -> GatewaySettings {
    let mut settings = GatewaySettings::new(&config.api_type, &config.model);
    settings.api_key = config.api_key.clone();
    settings.base_url = config.base_url.clone();
    settings.temperature = config.temperature;
    settings.max_tokens = Some(config.max_tokens);
    settings.request_timeout = Duration::from_secs(120);
    settings
}

pub async fn run(args: AgentArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    apply_overrides(&mut config, &args);
    config.validate()?;

    let tools = default_registry(&ToolSettings {
        shell_timeout_ms: config.tools.shell_timeout_ms,
        search_max_results: config.tools.search_max_results,
    })?;
    let prompt = system_prompt(config.agent.system_prompt.as_deref(), &tools.definitions());
    let tool_names: Vec<String> = tools.names().iter().map(|n| n.to_string()).collect();

    let gateway = Arc::new(ModelGateway::configure(gateway_settings(&config))?);
    let orchestrator = TurnOrchestrator::new(gateway)
        .with_repair(config.agent.repair)
        .with_max_rounds(config.agent.max_rounds);
    let runner = AgentRunner::new(orchestrator).with_prefix_cwd(config.agent.prefix_cwd);

    let mut session = Session::new(prompt, Arc::new(tools), config.agent.input_mode);

    let interactive = args.message.is_none() || config.agent.input_mode == InputMode::Always;
    if interactive {
        println!();
        println!("  Ferrule — {} via {}", config.model, config.api_type);
        println!("  Tools: {}", tool_names.join(", "));
        println!("  Type 'exit' or 'quit' to leave, 'cd <dir>' to move around.");
        println!();
    }

    let mut input = StdinPrompt::new("> ");
    let mut output = TerminalSink::stdio();
    let summary = runner
        .run(&mut session, args.message, &mut input, &mut output)
        .await;

    tracing::info!(turns = summary.turns, reason = ?summary.reason, "Agent finished");
    if interactive && summary.reason != StopReason::EndOfInput {
        println!();
        println!("  Goodbye!");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_core::provider::ApiType;

    fn args() -> AgentArgs {
        AgentArgs {
            message: None,
            input_mode: None,
            api_type: None,
            model: None,
            base_url: None,
            repair: None,
        }
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        let args = AgentArgs {
            input_mode: Some(InputMode::Never),
            api_type: Some("hosted".into()),
            model: Some("gpt-4o".into()),
            base_url: Some("http://localhost:9999/v1".into()),
            repair: Some(RepairPolicy::Off),
            ..args()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.agent.input_mode, InputMode::Never);
        assert_eq!(config.api_type().unwrap(), ApiType::Hosted);
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:9999/v1"));
        assert_eq!(config.agent.repair, RepairPolicy::Off);
    }

    #[test]
    fn absent_flags_keep_config() {
        let mut config = AppConfig::default();
        apply_overrides(&mut config, &args());
        assert_eq!(config.model, AppConfig::default().model);
        assert_eq!(config.agent.repair, RepairPolicy::Dispatch);
    }

    #[test]
    fn hosted_without_key_fails_validation() {
        let mut config = AppConfig::default();
        config.api_key = None;
        let args = AgentArgs {
            api_type: Some("hosted".into()),
            ..args()
        };
        apply_overrides(&mut config, &args);
        assert!(config.validate().is_err());
    }

    #[test]
    fn local_settings_configure_a_gateway() {
        let config = AppConfig::default();
        let gateway = ModelGateway::configure(gateway_settings(&config)).unwrap();
        assert_eq!(gateway.api_type(), ApiType::LocalCompatible);
        assert_eq!(gateway.model(), config.model);
    }
}
