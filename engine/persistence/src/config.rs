//! Configuration for the persistence layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Location of the snapshot file
    pub snapshot_path: PathBuf,

    /// Whether to gzip the snapshot file
    pub compress: bool,

    /// Whether to pretty-print the JSON payload (ignored when compressed)
    pub pretty: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./data/last_good_snapshot.json"),
            compress: false,
            pretty: true,
        }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with the given snapshot path
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.snapshot_path.as_os_str().is_empty() {
            return Err("snapshot_path must not be empty".to_string());
        }

        if self.snapshot_path.is_dir() {
            return Err(format!("snapshot_path {:?} is a directory", self.snapshot_path));
        }

        Ok(())
    }

    /// Path of the temporary file used for atomic replacement
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .snapshot_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.snapshot_path.with_file_name(name)
    }
}
