//! Mesh device access
//!
//! This module provides the node snapshot reader:
//! - Spawns the Meshtastic CLI client as a subprocess (`meshtastic --info`)
//! - Captures its report and extracts the `My info:` and `Nodes in mesh:` JSON blocks
//! - Converts the node database into typed records
//! - Kills and reaps the subprocess on every exit path
//!
//! The radio protocol itself stays with the driver; this crate only reads its report.

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::node::{snapshot_from_json, LocalNode, NodeSnapshot};
use serde_json::Value;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

const MY_INFO_MARKER: &str = "My info:";
const NODES_MARKER: &str = "Nodes in mesh:";

/// Source of node snapshots
///
/// The pipeline only needs these reads; connecting is up to the implementation.
#[allow(async_fn_in_trait)]
pub trait MeshDevice {
    /// Every node the device knows about
    async fn list_nodes(&mut self) -> Result<NodeSnapshot, DeviceError>;

    /// Id and info of the node the device itself runs
    async fn local_node(&mut self) -> Result<LocalNode, DeviceError>;

    /// Release the connection; calling it twice is a no-op
    async fn close(&mut self) -> Result<(), DeviceError>;
}

/// Parsed `--info` report
#[derive(Debug, Clone, Default)]
pub struct DeviceReport {
    pub my_node_num: Option<u32>,
    pub nodes: NodeSnapshot,
}

impl DeviceReport {
    /// Parse the text printed by `meshtastic --info`
    pub fn parse(text: &str) -> Result<Self, DeviceError> {
        let nodes = json_after(text, NODES_MARKER)?.ok_or_else(|| {
            DeviceError::Snapshot(format!("report has no '{}' block", NODES_MARKER))
        })?;
        let nodes = snapshot_from_json(nodes)?;

        let my_node_num = match json_after(text, MY_INFO_MARKER)? {
            Some(my_info) => my_info
                .get("myNodeNum")
                .and_then(Value::as_u64)
                .and_then(|num| u32::try_from(num).ok()),
            None => None,
        };
        if my_node_num.is_none() {
            warn!("Device report does not identify the local node");
        }

        Ok(Self { my_node_num, nodes })
    }
}

/// Extract the JSON value printed after `marker`
///
/// Example input: `My info: {"myNodeNum": 42, ...}\nMetadata: ...`
/// Returns: the object following the marker; trailing report text is ignored.
fn json_after(text: &str, marker: &str) -> Result<Option<Value>, DeviceError> {
    // Only a marker opening a line counts; free text such as the owner name may contain it
    let mut offset = 0;
    let mut start_idx = None;
    for line in text.split_inclusive('\n') {
        let body = line.trim_start();
        if body.starts_with(marker) {
            start_idx = Some(offset + (line.len() - body.len()) + marker.len());
            break;
        }
        offset += line.len();
    }
    let Some(start_idx) = start_idx else {
        return Ok(None);
    };
    let rest = text[start_idx..].trim_start();

    let mut values = serde_json::Deserializer::from_str(rest).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(Some(value)),
        Some(Err(e)) => Err(DeviceError::Snapshot(format!(
            "malformed '{}' block: {}",
            marker, e
        ))),
        None => Err(DeviceError::Snapshot(format!("empty '{}' block", marker))),
    }
}

/// Device reached through the Meshtastic CLI
pub struct CliDevice {
    program: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    report: Option<DeviceReport>,
}

impl CliDevice {
    /// Spawn the driver and hold its output until the first read
    pub async fn connect(config: &DeviceConfig) -> Result<Self, DeviceError> {
        info!(
            program = %config.program,
            port = ?config.port,
            "Connecting to mesh device"
        );

        let mut command = build_command(config);
        let mut child = command.spawn().map_err(|e| {
            DeviceError::Connection(format!("failed to spawn {}: {}", config.program, e))
        })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            DeviceError::Connection("failed to capture device stdout".to_string())
        })?;

        Ok(Self {
            program: config.program.clone(),
            child: Some(child),
            stdout: Some(stdout),
            report: None,
        })
    }

    async fn report(&mut self) -> Result<&DeviceReport, DeviceError> {
        let report = match self.report.take() {
            Some(report) => report,
            None => self.read_report().await?,
        };
        Ok(&*self.report.insert(report))
    }

    async fn read_report(&mut self) -> Result<DeviceReport, DeviceError> {
        let mut stdout = self.stdout.take().ok_or_else(|| {
            DeviceError::Snapshot("device output was already consumed".to_string())
        })?;

        // Read the whole report; the driver exits once it has printed it
        let mut text = String::new();
        stdout
            .read_to_string(&mut text)
            .await
            .map_err(|e| DeviceError::Snapshot(format!("failed to read device output: {}", e)))?;
        debug!(bytes = text.len(), "Device report received");

        // Reap the driver and reject reports from a failed run
        if let Some(mut child) = self.child.take() {
            let status = child.wait().await.map_err(|e| {
                DeviceError::Connection(format!("failed to wait for {}: {}", self.program, e))
            })?;
            if !status.success() {
                return Err(DeviceError::Connection(format!(
                    "{} exited with {}",
                    self.program, status
                )));
            }
        }

        DeviceReport::parse(&text)
    }
}

/// Driver invocation: `<program> [--port <port>] <args...>`
fn build_command(config: &DeviceConfig) -> Command {
    let mut command = Command::new(&config.program);
    if let Some(port) = &config.port {
        command.arg("--port").arg(port);
    }
    command
        .args(&config.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit()) // Pass through driver diagnostics
        .kill_on_drop(true);
    command
}

impl MeshDevice for CliDevice {
    async fn list_nodes(&mut self) -> Result<NodeSnapshot, DeviceError> {
        let report = self.report().await?;
        info!(nodes = report.nodes.len(), "Node snapshot read");
        Ok(report.nodes.clone())
    }

    async fn local_node(&mut self) -> Result<LocalNode, DeviceError> {
        let report = self.report().await?;
        let local = LocalNode::resolve(&report.nodes, report.my_node_num);
        info!(node_id = ?local.node_id, "Local node identified");
        Ok(local)
    }

    async fn close(&mut self) -> Result<(), DeviceError> {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            debug!(program = %self.program, "Stopping device driver");
            child.kill().await.map_err(|e| {
                DeviceError::Connection(format!("failed to stop {}: {}", self.program, e))
            })?;
        }
        Ok(())
    }
}
