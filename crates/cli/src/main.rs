//! Ferrule CLI — the main entry point.
//!
//! Commands:
//! - `agent`   — Talk to the model in the terminal (interactive or single prompt)
//! - `tools`   — List the registered tools
//! - `config`  — Show or initialize the configuration file
//! - `doctor`  — Check configuration and backend reachability

use clap::{Parser, Subcommand};

mod commands;
mod terminal;

#[derive(Parser)]
#[command(
    name = "ferrule",
    about = "Ferrule — a terminal agent that works through tools",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent
    Agent(commands::agent::AgentArgs),

    /// List the tools the agent can call
    Tools {
        /// Print the full definitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and backend health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the conversation.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Agent(args) => commands::agent::run(args).await?,
        Commands::Tools { json } => commands::tools::run(json).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrule_config::{InputMode, RepairPolicy};

    #[test]
    fn parses_agent_flags() {
        let cli = Cli::try_parse_from([
            "ferrule",
            "agent",
            "--message",
            "list files",
            "--input-mode",
            "never",
            "--api-type",
            "hosted",
            "--repair",
            "advisory",
        ])
        .unwrap();
        let Commands::Agent(args) = cli.command else {
            panic!("expected agent command");
        };
        assert_eq!(args.message.as_deref(), Some("list files"));
        assert_eq!(args.input_mode, Some(InputMode::Never));
        assert_eq!(args.api_type.as_deref(), Some("hosted"));
        assert_eq!(args.repair, Some(RepairPolicy::Advisory));
    }

    #[test]
    fn rejects_unknown_repair_policy() {
        assert!(Cli::try_parse_from(["ferrule", "agent", "--repair", "sometimes"]).is_err());
    }

    #[test]
    fn verbose_is_global() {
        let cli = Cli::try_parse_from(["ferrule", "doctor", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
