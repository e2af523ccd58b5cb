//! Render a synthetic mesh without a device
//!
//! Run with: cargo run --example render_sample

use meshtastic_map::config::MapConfig;
use meshtastic_map::node::{LocalNodeInfo, NodeRecord, NodeSnapshot, Position};
use meshtastic_map::render;
use std::path::Path;

fn node(
    id: &str,
    name: &str,
    lat: f64,
    lon: f64,
    snr: Option<f64>,
    hops: Option<u32>,
) -> NodeRecord {
    NodeRecord {
        long_name: Some(name.to_string()),
        short_name: Some(name.chars().take(2).collect::<String>().to_uppercase()),
        position: Some(Position::new(lat, lon)),
        snr,
        hops_away: hops,
        ..NodeRecord::new(id)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_target(false)
        .init();

    let mut home = node("!00000001", "Home Base", 48.4704, 9.2013, None, None);
    home.battery_level = Some(93);

    let mut nodes = NodeSnapshot::new();
    for record in [
        home.clone(),
        node("!00000002", "Ridge", 48.52, 9.05, Some(-14.0), Some(0)),
        node("!00000003", "Quarry", 48.44, 9.12, Some(-3.5), Some(0)),
        node("!00000004", "Tower", 48.49, 9.31, Some(4.0), Some(0)),
        node("!00000005", "Garden", 48.47, 9.21, Some(9.25), Some(0)),
        node("!00000006", "Valley Car", 48.36, 9.40, Some(7.0), Some(2)),
    ] {
        nodes.insert(record.node_id.clone(), record);
    }

    let info = LocalNodeInfo::from(&home);
    let map = render(&nodes, Some(&home.node_id), Some(&info), &MapConfig::default());
    map.save(Path::new("sample_map.html"))?;

    println!("Wrote sample_map.html with {} markers", map.nodes.len());
    Ok(())
}
