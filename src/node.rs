//! Typed node records
//!
//! The device driver reports its node database as loosely structured JSON
//! (`interface.nodes` in the Meshtastic client). Records are validated into
//! [`NodeRecord`] once, at snapshot-read time, so rendering only ever deals
//! with typed optionals.

use crate::classify::{classify, MarkerColor};
use crate::error::DeviceError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Snapshot of every node the device knows, keyed by node id
pub type NodeSnapshot = BTreeMap<String, NodeRecord>;

/// Reported position; either coordinate may be missing
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// Coordinates usable for drawing
    ///
    /// A zero coordinate counts as missing, so a node reporting (0, 0) is never
    /// drawn. Devices without a GPS fix report exactly that.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
            _ => None,
        }
    }
}

/// One known mesh node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeRecord {
    /// Stable node id (e.g. "!a1b2c3d4")
    pub node_id: String,
    /// Numeric node number
    pub num: Option<u32>,
    pub position: Option<Position>,
    /// Signal-to-noise ratio of the last packet heard, in dB
    pub snr: Option<f64>,
    /// Relay hops to this node; 0 means direct radio contact
    pub hops_away: Option<u32>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    /// Battery level in percent
    pub battery_level: Option<u32>,
    /// Unix timestamp of the last packet heard
    pub last_heard: Option<i64>,
}

impl NodeRecord {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }

    /// Drawable coordinates, if the node has any
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.position.as_ref().and_then(Position::coordinates)
    }

    /// Whether the node is in direct radio contact with the local node
    pub fn is_direct(&self) -> bool {
        self.hops_away == Some(0)
    }

    fn from_raw(node_id: String, raw: RawNode) -> Self {
        let (long_name, short_name) = raw
            .user
            .map(|user| (user.long_name, user.short_name))
            .unwrap_or_default();

        Self {
            node_id,
            num: raw.num,
            position: raw.position.map(RawPosition::into_position),
            snr: raw.snr,
            hops_away: raw.hops_away,
            long_name,
            short_name,
            battery_level: raw.device_metrics.and_then(|m| m.battery_level),
            last_heard: raw.last_heard,
        }
    }
}

/// Identity and battery of the node the device itself runs
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalNodeInfo {
    pub node_id: String,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub battery_level: Option<u32>,
}

impl From<&NodeRecord> for LocalNodeInfo {
    fn from(record: &NodeRecord) -> Self {
        Self {
            node_id: record.node_id.clone(),
            long_name: record.long_name.clone(),
            short_name: record.short_name.clone(),
            battery_level: record.battery_level,
        }
    }
}

/// Result of the local node query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LocalNode {
    pub node_id: Option<String>,
    pub info: Option<LocalNodeInfo>,
}

impl LocalNode {
    /// Cross-reference the device's own node number against the snapshot
    ///
    /// When the number is known but no record carries it, the id is still
    /// derived in Meshtastic's `!%08x` form and `info` stays empty.
    pub fn resolve(snapshot: &NodeSnapshot, my_node_num: Option<u32>) -> Self {
        let Some(num) = my_node_num else {
            return Self::default();
        };

        match snapshot.values().find(|record| record.num == Some(num)) {
            Some(record) => Self {
                node_id: Some(record.node_id.clone()),
                info: Some(LocalNodeInfo::from(record)),
            },
            None => {
                debug!(my_node_num = num, "Local node not present in snapshot");
                Self {
                    node_id: Some(format!("!{:08x}", num)),
                    info: None,
                }
            }
        }
    }
}

/// Node record augmented with its marker color
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedNode {
    pub record: NodeRecord,
    pub color: MarkerColor,
}

impl From<NodeRecord> for ClassifiedNode {
    fn from(record: NodeRecord) -> Self {
        let color = classify(record.snr, record.hops_away);
        Self { record, color }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    num: Option<u32>,
    user: Option<RawUser>,
    position: Option<RawPosition>,
    snr: Option<f64>,
    hops_away: Option<u32>,
    device_metrics: Option<RawDeviceMetrics>,
    last_heard: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUser {
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    latitude: Option<f64>,
    longitude: Option<f64>,
    /// Fixed-point latitude in 1e-7 degrees
    latitude_i: Option<i64>,
    /// Fixed-point longitude in 1e-7 degrees
    longitude_i: Option<i64>,
}

impl RawPosition {
    fn into_position(self) -> Position {
        Position {
            latitude: self
                .latitude
                .or_else(|| self.latitude_i.map(|v| v as f64 * 1e-7)),
            longitude: self
                .longitude
                .or_else(|| self.longitude_i.map(|v| v as f64 * 1e-7)),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeviceMetrics {
    battery_level: Option<u32>,
}

/// Build a snapshot from the driver's node database (an object keyed by node id)
///
/// Records that fail to decode are skipped; only a non-object database is an
/// error.
pub fn snapshot_from_json(value: Value) -> Result<NodeSnapshot, DeviceError> {
    let Value::Object(entries) = value else {
        return Err(DeviceError::Snapshot(
            "node database is not a JSON object".to_string(),
        ));
    };

    let mut snapshot = NodeSnapshot::new();
    for (node_id, raw) in entries {
        match serde_json::from_value::<RawNode>(raw) {
            Ok(raw) => {
                snapshot.insert(node_id.clone(), NodeRecord::from_raw(node_id, raw));
            }
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Skipping undecodable node record");
            }
        }
    }

    Ok(snapshot)
}
