//! `advisorguard doctor`: diagnose config, PDP and provider.

use advisorguard_config::AppConfig;
use advisorguard_core::{PolicyDecisionPoint, Provider};
use advisorguard_pdp::{HttpPdpClient, PolicyCatalog};
use advisorguard_providers::AnthropicProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("AdvisorGuard Doctor: System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults (run `advisorguard onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config and re-run doctor.");
            return Ok(());
        }
    };

    match PolicyCatalog::load(&config.catalog.source) {
        Ok(catalog) => println!("  ✅ Catalog '{}' valid", catalog.name),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if config.has_pdp_key() {
        println!("  ✅ PDP API key configured");
    } else {
        println!("  ⚠️  No PDP API key (set ADVISORGUARD_PDP_KEY)");
        issues += 1;
    }

    match HttpPdpClient::from_config(&config.pdp) {
        Ok(pdp) => match pdp.health_check().await {
            Ok(true) => println!("  ✅ PDP reachable at {}", pdp.base_url()),
            Ok(false) => {
                println!("  ❌ PDP at {} reports unhealthy", pdp.base_url());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ PDP unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ PDP client: {e}");
            issues += 1;
        }
    }

    match AnthropicProvider::from_config(&config.provider) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Model provider reachable ({})", config.provider.model),
            Ok(false) => {
                println!("  ❌ Model provider rejected the API key");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Model provider unreachable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ⚠️  {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
