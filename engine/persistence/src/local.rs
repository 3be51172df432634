//! Local file-based snapshot store

use crate::backend::LocalSnapshotStore;
use crate::config::PersistenceConfig;
use crate::error::Result;

/// Create a new local store with default configuration
pub fn create_local_store(
    snapshot_path: impl Into<std::path::PathBuf>,
) -> Result<LocalSnapshotStore> {
    LocalSnapshotStore::new(PersistenceConfig::new(snapshot_path))
}

/// Create a new local store with custom configuration
pub fn create_local_store_with_config(config: PersistenceConfig) -> Result<LocalSnapshotStore> {
    LocalSnapshotStore::new(config)
}
