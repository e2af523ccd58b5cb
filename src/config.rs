//! Configuration management for the mesh map renderer
//!
//! Loads configuration from an optional TOML file with environment variable
//! overrides. Every field has a default, so running without a file renders
//! with the stock map view and writes `meshtastic_map.html`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "meshtastic_map.toml";

/// Complete renderer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub map: MapConfig,
    pub output: OutputConfig,
}

/// Device driver invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Driver program; its report must contain the node database
    pub program: String,
    /// Serial port passed as `--port`; auto-detected by the driver when unset
    pub port: Option<String>,
    pub args: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            program: "meshtastic".to_string(),
            port: None,
            args: vec!["--info".to_string()],
        }
    }
}

/// Map view settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub tiles_url: String,
    pub attribution: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: 48.4704,
            center_lon: 9.2013,
            zoom: 10,
            tiles_url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            attribution: "&copy; OpenStreetMap contributors".to_string(),
        }
    }
}

/// Output artifact location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("meshtastic_map.html"),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if it does not exist
    ///
    /// Environment variables override config file values:
    /// - MESHTASTIC_PORT: Override the device serial port
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            let config_str = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path))?;

            toml::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file: {}", path))?
        } else {
            tracing::info!(path = path, "No config file found, using defaults");
            Config::default()
        };

        if let Ok(port) = std::env::var("MESHTASTIC_PORT") {
            tracing::info!("Using MESHTASTIC_PORT from environment");
            config.device.port = Some(port);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.device.program.trim().is_empty() {
            anyhow::bail!("Device program must not be empty");
        }

        if self.map.zoom > 19 {
            anyhow::bail!("Invalid map zoom: {} (must be 0 to 19)", self.map.zoom);
        }

        if !(-90.0..=90.0).contains(&self.map.center_lat) {
            anyhow::bail!("Invalid map center latitude: {}", self.map.center_lat);
        }

        if !(-180.0..=180.0).contains(&self.map.center_lon) {
            anyhow::bail!("Invalid map center longitude: {}", self.map.center_lon);
        }

        let is_html = self
            .output
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html") || ext.eq_ignore_ascii_case("htm"));
        if !is_html {
            anyhow::bail!(
                "Output path must be an .html file: {}",
                self.output.path.display()
            );
        }

        Ok(())
    }
}
