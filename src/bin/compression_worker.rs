//! # Compression Worker
//!
//! Drains the image queue until Ctrl-C. Exits non-zero when the broker
//! connection is lost so a supervisor can restart it.
//!
//! Configuration comes from `CATALOG_CONFIG_PATH` (default
//! `config/catalog.toml`) plus `CATALOG__SECTION__KEY` overrides.

use anyhow::{Context, Result};
use catalog_core::logging::init_structured_logging;
use catalog_core::{CatalogContext, ConfigManager};
use std::process;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_structured_logging();

    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "Compression worker exited with error");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config_manager = ConfigManager::load().context("failed to load configuration")?;
    let context = CatalogContext::from_config(config_manager)
        .await
        .context("failed to initialize catalog context")?;

    let outcome = match context.compression_worker() {
        Ok(worker) => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            worker.run(shutdown).await
        }
        Err(e) => Err(e),
    };

    context.shutdown().await;

    let stats = outcome.context("compression worker stopped")?;
    info!(
        processed = stats.processed(),
        completed = stats.completed,
        dead_lettered = stats.dead_lettered,
        "Compression worker finished"
    );
    Ok(())
}
