//! `ferrule tools` — List the tools the agent can call.

use ferrule_config::AppConfig;
use ferrule_tools::{ToolSettings, default_registry};

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let registry = default_registry(&ToolSettings {
        shell_timeout_ms: config.tools.shell_timeout_ms,
        search_max_results: config.tools.search_max_results,
    })?;
    let definitions = registry.definitions();

    if json {
        println!("{}", serde_json::to_string_pretty(&definitions)?);
        return Ok(());
    }

    println!("🔧 {} tools registered\n", definitions.len());
    for def in &definitions {
        println!("  {}", def.name);
        println!("      {}", def.description);
        if let Some(props) = def.parameters["properties"].as_object() {
            let required: Vec<&str> = def.parameters["required"]
                .as_array()
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let params: Vec<String> = props
                .keys()
                .map(|k| {
                    if required.contains(&k.as_str()) {
                        k.clone()
                    } else {
                        format!("{k}?")
                    }
                })
                .collect();
            println!("      params: {}", params.join(", "));
        }
        println!();
    }
    Ok(())
}
