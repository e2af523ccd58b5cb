//! End-to-end mapping runs against fake and subprocess-backed devices

use meshtastic_map::config::{Config, DeviceConfig};
use meshtastic_map::node::{LocalNode, LocalNodeInfo, NodeRecord, NodeSnapshot, Position};
use meshtastic_map::pipeline::{run, run_with};
use meshtastic_map::{DeviceError, MarkerColor, MeshDevice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// In-memory device with scripted answers
struct FakeDevice {
    nodes: Result<NodeSnapshot, String>,
    local: LocalNode,
    closed: Arc<AtomicBool>,
}

impl FakeDevice {
    fn new(nodes: NodeSnapshot, local: LocalNode) -> (Self, Arc<AtomicBool>) {
        let closed = Arc::new(AtomicBool::new(false));
        let device = Self {
            nodes: Ok(nodes),
            local,
            closed: closed.clone(),
        };
        (device, closed)
    }

    fn failing(reason: &str) -> (Self, Arc<AtomicBool>) {
        let (mut device, closed) = Self::new(NodeSnapshot::new(), LocalNode::default());
        device.nodes = Err(reason.to_string());
        (device, closed)
    }
}

impl MeshDevice for FakeDevice {
    async fn list_nodes(&mut self) -> Result<NodeSnapshot, DeviceError> {
        self.nodes.clone().map_err(DeviceError::Snapshot)
    }

    async fn local_node(&mut self) -> Result<LocalNode, DeviceError> {
        Ok(self.local.clone())
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.output.path = dir.path().join("meshtastic_map.html");
    config
}

fn placed(id: &str, lat: f64, lon: f64, snr: Option<f64>, hops: Option<u32>) -> NodeRecord {
    NodeRecord {
        position: Some(Position::new(lat, lon)),
        snr,
        hops_away: hops,
        ..NodeRecord::new(id)
    }
}

#[tokio::test]
async fn test_run_writes_map_and_closes_device() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let mut me = placed("self", 10.0, 10.0, None, None);
    me.battery_level = Some(80);
    let mut nodes = NodeSnapshot::new();
    nodes.insert("A".to_string(), placed("A", 10.0, 10.0, Some(-15.0), Some(0)));
    nodes.insert("B".to_string(), placed("B", 10.0, 11.0, Some(8.0), Some(1)));
    nodes.insert("self".to_string(), me.clone());
    let local = LocalNode {
        node_id: Some("self".to_string()),
        info: Some(LocalNodeInfo::from(&me)),
    };

    let (device, closed) = FakeDevice::new(nodes, local);
    let map = run_with(device, &config).await.unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(map.view.markers().len(), 3);
    assert_eq!(map.view.polylines().len(), 1);
    assert_eq!(map.view.polylines()[0].color, MarkerColor::Red);

    let html = std::fs::read_to_string(&config.output.path).unwrap();
    assert!(html.contains("Battery: 80%"));
    assert!(html.contains("\"color\":\"red\""));
    assert!(html.contains("\"color\":\"black\""));
}

#[tokio::test]
async fn test_empty_snapshot_writes_base_map() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let (device, closed) = FakeDevice::new(NodeSnapshot::new(), LocalNode::default());
    let map = run_with(device, &config).await.unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert!(map.view.markers().is_empty());
    let html = std::fs::read_to_string(&config.output.path).unwrap();
    assert!(html.contains("\"markers\":[]"));
    assert!(html.contains("\"lines\":[]"));
    assert!(!html.contains("class=\"map-overlay\""));
}

#[tokio::test]
async fn test_snapshot_failure_aborts_without_output() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);

    let (device, closed) = FakeDevice::failing("radio busy");
    let err = run_with(device, &config).await.unwrap_err();

    assert!(matches!(err, DeviceError::Snapshot(ref reason) if reason == "radio busy"));
    assert!(closed.load(Ordering::SeqCst));
    assert!(!config.output.path.exists());
}

#[tokio::test]
async fn test_unwritable_output_is_reported() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.output.path = dir.path().join("missing-dir").join("map.html");

    let (device, _closed) = FakeDevice::new(NodeSnapshot::new(), LocalNode::default());
    let err = run_with(device, &config).await.unwrap_err();

    assert!(matches!(err, DeviceError::Output { .. }));
}

#[tokio::test]
async fn test_cli_device_report() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.device = DeviceConfig {
        program: "cat".to_string(),
        port: None,
        args: vec![concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/info_report.txt").to_string()],
    };

    let map = run(&config).await.unwrap();

    // "Indoor Node" has no position
    assert_eq!(map.nodes.len(), 3);
    let color_of = |id: &str| {
        map.nodes
            .iter()
            .find(|n| n.record.node_id == id)
            .map(|n| n.color)
    };
    assert_eq!(color_of("!a1b2c3d4"), Some(MarkerColor::Black));
    assert_eq!(color_of("!0badcafe"), Some(MarkerColor::Red));
    assert_eq!(color_of("!1234abcd"), Some(MarkerColor::Black));
    assert_eq!(color_of("!00c0ffee"), None);

    let lines = map.view.polylines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].from.lat, 48.4704);
    assert_eq!(lines[0].to.lat, 48.52);

    let panel = &map.view.overlays()[0];
    assert!(panel.contains("ID: !a1b2c3d4"));
    assert!(panel.contains("Base Station (BS)"));
    assert!(panel.contains("Battery: 80%"));
    assert!(config.output.path.exists());
}

#[tokio::test]
async fn test_missing_driver_is_a_connection_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.device.program = "meshtastic-map-no-such-driver".to_string();

    let err = run(&config).await.unwrap_err();
    assert!(matches!(err, DeviceError::Connection(_)));
    assert!(!config.output.path.exists());
}

#[tokio::test]
async fn test_failing_driver_is_a_connection_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.device = DeviceConfig {
        program: "false".to_string(),
        port: None,
        args: Vec::new(),
    };

    let err = run(&config).await.unwrap_err();
    assert!(matches!(err, DeviceError::Connection(_)));
    assert!(!config.output.path.exists());
}
