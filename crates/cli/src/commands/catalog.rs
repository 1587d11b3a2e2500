//! `advisorguard catalog`: show and validate a policy catalog.

use super::{catalog_source, load_config};
use advisorguard_pdp::{BUILTIN_CATALOGS, PolicyCatalog};

pub async fn run(source: Option<String>, list: bool) -> Result<(), Box<dyn std::error::Error>> {
    if list {
        println!("Built-in catalogs:");
        for name in BUILTIN_CATALOGS {
            let catalog = PolicyCatalog::builtin(name)?;
            println!("  {:<15} {}", name, catalog.description);
        }
        return Ok(());
    }

    let config = load_config()?;
    let source = catalog_source(source, &config);
    // load() validates; an invalid catalog never prints a summary
    let catalog = PolicyCatalog::load(&source)?;
    print!("{}", catalog.summary());
    println!("\n  ✅ Catalog is valid");
    Ok(())
}
