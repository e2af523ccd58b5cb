//! Meshtastic node map renderer
//!
//! This tool:
//! - Runs the Meshtastic CLI client against the connected device
//! - Parses the node database from its report
//! - Colors every positioned node by SNR and links direct neighbors to the local node
//! - Writes a self-contained Leaflet map to `meshtastic_map.html`
//!
//! Architecture: meshtastic --info → stdout → parser → classifier → renderer → HTML file

use anyhow::{Context, Result};
use meshtastic_map::config::{Config, DEFAULT_CONFIG_PATH};
use meshtastic_map::pipeline;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Meshtastic map renderer starting");

    let config = Config::load(DEFAULT_CONFIG_PATH)
        .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH))?;

    let map = pipeline::run(&config)
        .await
        .context("Failed to render mesh map")?;

    info!(
        path = %config.output.path.display(),
        nodes = map.nodes.len(),
        "Map created successfully"
    );
    Ok(())
}
