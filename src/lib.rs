//! Meshtastic node map
//!
//! Reads the node database of a connected Meshtastic device and renders it as
//! an interactive Leaflet map with SNR-colored markers and links to the local node.

pub mod classify;
pub mod config;
pub mod device;
pub mod error;
pub mod map;
pub mod node;
pub mod pipeline;
pub mod render;

pub use classify::{classify, MarkerColor};
pub use config::Config;
pub use device::{CliDevice, MeshDevice};
pub use error::DeviceError;
pub use node::{LocalNode, LocalNodeInfo, NodeRecord, NodeSnapshot, Position};
pub use render::{render, RenderedMap};
