//! One mapping run: device → snapshot → render → file
//!
//! Architecture: driver subprocess → report parser → classifier → renderer → HTML file

use crate::config::Config;
use crate::device::{CliDevice, MeshDevice};
use crate::error::DeviceError;
use crate::render::{render, RenderedMap};
use tracing::{error, info, warn};

/// Connect to the configured device and render its node map
pub async fn run(config: &Config) -> Result<RenderedMap, DeviceError> {
    let device = CliDevice::connect(&config.device).await?;
    run_with(device, config).await
}

/// Render the node map from an already connected device
///
/// The device is closed before returning, whether or not the run succeeded.
/// Nothing is written unless the snapshot was read and rendered in full.
pub async fn run_with<D: MeshDevice>(
    mut device: D,
    config: &Config,
) -> Result<RenderedMap, DeviceError> {
    // Read and render while the device is open
    let outcome = collect_and_render(&mut device, config).await;

    // Release the device on every path
    if let Err(e) = device.close().await {
        warn!(error = %e, "Failed to close device connection");
    }

    let map = match outcome {
        Ok(map) => map,
        Err(e) => {
            error!(error = %e, "Mapping run aborted");
            return Err(e);
        }
    };

    // Persist only a complete map
    let path = &config.output.path;
    map.save(path).map_err(|source| DeviceError::Output {
        path: path.clone(),
        source,
    })?;

    info!(
        path = %path.display(),
        markers = map.view.markers().len(),
        links = map.view.polylines().len(),
        "Map saved"
    );

    Ok(map)
}

async fn collect_and_render<D: MeshDevice>(
    device: &mut D,
    config: &Config,
) -> Result<RenderedMap, DeviceError> {
    let nodes = device.list_nodes().await?;
    // Local node identity is resolved against the same snapshot
    let local = device.local_node().await?;

    Ok(render(
        &nodes,
        local.node_id.as_deref(),
        local.info.as_ref(),
        &config.map,
    ))
}
