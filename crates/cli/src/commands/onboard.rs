//! `advisorguard onboard`: first-time setup.

use advisorguard_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("AdvisorGuard: First-Time Setup");
    println!("==============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set ADVISORGUARD_PDP_KEY and ANTHROPIC_API_KEY (or edit the config)");
    println!("   2. Run: advisorguard provision --dry-run, then advisorguard provision");
    println!("   3. Run: advisorguard doctor");
    println!("   4. Ask: advisorguard ask \"What is an index fund?\" --opt-in true\n");
    Ok(())
}
