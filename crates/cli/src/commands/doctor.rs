//! `ferrule doctor` — Diagnose configuration and backend health.

use super::agent::gateway_settings;
use ferrule_config::AppConfig;
use ferrule_core::provider::ApiType;
use ferrule_providers::ModelGateway;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Ferrule Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (`ferrule config init` writes one)");
    }

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            return Err("configuration could not be loaded".into());
        }
    };

    if let Err(e) = config.validate() {
        println!("  ❌ {e}");
        println!("\n  ⚠️  Fix the configuration before running the agent.");
        return Ok(());
    }
    println!("  ✅ Config valid ({} / {})", config.api_type, config.model);

    let gateway = match ModelGateway::configure(gateway_settings(&config)) {
        Ok(gateway) => gateway,
        Err(e) => {
            println!("  ❌ Gateway: {e}");
            return Ok(());
        }
    };

    match gateway.provider().health_check().await {
        Ok(true) => println!("  ✅ Backend reachable"),
        Ok(false) => {
            println!("  ❌ Backend answered but reported an error");
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Backend unreachable: {e}");
            issues += 1;
        }
    }

    match gateway.provider().list_models().await {
        Ok(models) if models.iter().any(|m| m == gateway.model()) => {
            println!("  ✅ Model '{}' available", gateway.model());
        }
        Ok(models) if models.is_empty() => {
            println!("  ⚠️  Backend did not list any models");
            issues += 1;
        }
        Ok(models) => {
            println!(
                "  ⚠️  Model '{}' not listed ({} models available)",
                gateway.model(),
                models.len()
            );
            issues += 1;
        }
        Err(e) => {
            println!("  ⚠️  Could not list models: {e}");
            issues += 1;
        }
    }

    if gateway.api_type() == ApiType::LocalCompatible && gateway.is_small_model() {
        println!("  ℹ️  Small model detected; requests carry tool-format instructions");
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
