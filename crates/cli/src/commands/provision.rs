//! `advisorguard provision`: push a policy catalog to the PDP management API.

use super::{catalog_source, load_config};
use advisorguard_pdp::{PolicyCatalog, ProvisioningClient};

pub async fn run(source: Option<String>, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let source = catalog_source(source, &config);
    let catalog = PolicyCatalog::load(&source)?;

    if dry_run {
        print!("{}", catalog.summary());
        println!("\n  Dry run: nothing was sent to {}", config.pdp.api_url);
        return Ok(());
    }

    let client = ProvisioningClient::from_config(&config.pdp)?;
    println!("Provisioning '{}' to {} ...", catalog.name, config.pdp.api_url);
    let report = client.provision(&catalog).await?;

    println!("\n  Created: {}", report.created);
    if report.is_clean() {
        println!("  🎉 Provisioning complete");
    } else {
        println!("  Failed:  {}", report.failed());
        for failure in &report.failures {
            println!("    ❌ {failure}");
        }
        println!("\n  Items that already exist report a conflict; re-running is safe.");
    }
    Ok(())
}
