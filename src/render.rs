//! Map rendering for a node snapshot
//!
//! Turns one snapshot into a [`RenderedMap`]: a marker per positioned node,
//! a connectivity line from the local node to each direct neighbor, and an
//! info panel for the local node.

use crate::classify::MarkerColor;
use crate::config::MapConfig;
use crate::map::{escape_html, LatLon, MapView};
use crate::node::{ClassifiedNode, LocalNodeInfo, NodeRecord, NodeSnapshot};
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Stroke weight of connectivity lines
pub const LINK_WEIGHT: f64 = 3.0;
/// Opacity of connectivity lines
pub const LINK_OPACITY: f64 = 0.8;

const UNKNOWN: &str = "unknown";

/// Fully drawn map for one snapshot
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub view: MapView,
    /// Every positioned node, in draw order
    pub nodes: Vec<ClassifiedNode>,
}

impl RenderedMap {
    pub fn to_html(&self) -> serde_json::Result<String> {
        self.view.to_html()
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        self.view.save(path)
    }
}

/// Draw a snapshot onto a fresh map view
pub fn render(
    nodes: &NodeSnapshot,
    local_node_id: Option<&str>,
    local_info: Option<&LocalNodeInfo>,
    settings: &MapConfig,
) -> RenderedMap {
    let mut view = MapView::new(settings);
    let mut drawn = Vec::new();
    let mut neighbors: Vec<(LatLon, MarkerColor)> = Vec::new();
    let mut anchor: Option<LatLon> = None;

    for record in nodes.values() {
        let Some((lat, lon)) = record.coordinates() else {
            debug!(node_id = %record.node_id, "Node has no position, skipping");
            continue;
        };
        let position = LatLon::new(lat, lon);
        let node = ClassifiedNode::from(record.clone());

        view.add_marker(position, popup_text(record), node.color);

        if record.is_direct() {
            neighbors.push((position, node.color));
        }
        if local_node_id == Some(record.node_id.as_str()) {
            anchor = Some(position);
        }

        drawn.push(node);
    }

    let mut links = 0;
    if let Some(anchor) = anchor {
        for (position, color) in &neighbors {
            view.add_polyline(anchor, *position, *color, LINK_WEIGHT, LINK_OPACITY);
            links += 1;
        }
    }

    if let Some(info) = local_info {
        view.add_html_overlay(info_panel(info));
    }

    info!(
        nodes = nodes.len(),
        markers = drawn.len(),
        links = links,
        local_node = local_node_id.unwrap_or(UNKNOWN),
        "Rendered mesh map"
    );

    RenderedMap { view, nodes: drawn }
}

fn popup_text(record: &NodeRecord) -> String {
    format!(
        "Node ID: {}\n{} ({})\nHops: {}\nBattery: {}\nSNR: {}\nLast heard: {}",
        record.node_id,
        record.long_name.as_deref().unwrap_or(UNKNOWN),
        record.short_name.as_deref().unwrap_or(UNKNOWN),
        record
            .hops_away
            .map_or_else(|| UNKNOWN.to_string(), |h| h.to_string()),
        battery_text(record.battery_level),
        record
            .snr
            .map_or_else(|| UNKNOWN.to_string(), |snr| format!("{} dB", snr)),
        record
            .last_heard
            .map_or_else(|| UNKNOWN.to_string(), |ts| ts.to_string()),
    )
}

fn info_panel(info: &LocalNodeInfo) -> String {
    format!(
        "<b>Local node</b><br>ID: {}<br>Name: {} ({})<br>Battery: {}",
        escape_html(&info.node_id),
        escape_html(info.long_name.as_deref().unwrap_or(UNKNOWN)),
        escape_html(info.short_name.as_deref().unwrap_or(UNKNOWN)),
        battery_text(info.battery_level),
    )
}

fn battery_text(level: Option<u32>) -> String {
    level.map_or_else(|| UNKNOWN.to_string(), |b| format!("{}%", b))
}
