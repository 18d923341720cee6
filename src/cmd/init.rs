//! Data file bootstrap: `production-orders init`.

use anyhow::{Context, Result, bail};

use production_orders::config::AppConfig;
use production_orders::tracker::document::Document;
use production_orders::tracker::store::{JsonStore, load_default_prices};

pub fn cmd_init(config: &AppConfig, force: bool) -> Result<()> {
    let data_file = config.data_file();
    if data_file.exists() && !force {
        bail!(
            "Data file already exists at {}. Use --force to overwrite it.",
            data_file.display()
        );
    }

    let prices = load_default_prices(&config.default_prices_file());
    let store = JsonStore::new(data_file.clone(), prices);
    let doc = Document::new(store.default_prices());
    store
        .save(&doc)
        .with_context(|| format!("Failed to write {}", data_file.display()))?;

    println!("Initialized data file at {}", data_file.display());
    println!("  {} material prices seeded", doc.material_prices().len());
    Ok(())
}
