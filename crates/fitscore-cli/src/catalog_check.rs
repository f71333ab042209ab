//! The `catalog-check` subcommand: fail-fast validation of the model
//! catalog file, for use in deploy pipelines.

use fitscore_core::load_app_config;
use fitscore_engine::ModelCatalog;

pub fn run() -> anyhow::Result<()> {
    let cfg = load_app_config()?;
    let catalog = ModelCatalog::load(&cfg.catalog_path)?;
    println!(
        "catalog OK: {} models ({})",
        catalog.model_count(),
        cfg.catalog_path.display()
    );
    Ok(())
}
