use std::io;
use std::path::PathBuf;

/// Failures that abort a mapping run
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    /// The device could not be reached or the driver exited abnormally
    #[error("device connection failed: {0}")]
    Connection(String),
    /// The node list or local node query failed
    #[error("node snapshot failed: {0}")]
    Snapshot(String),
    /// The rendered map could not be written
    #[error("failed to write map to {}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
