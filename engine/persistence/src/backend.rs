//! Snapshot store trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use crate::snapshot::{self, Snapshot};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::sync::Mutex;

/// Abstract trait for snapshot storage backends
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `state` as the new snapshot, replacing any previous one
    async fn save<S>(&self, state: S) -> Result<Snapshot<S>>
    where
        S: Serialize + Send + Sync;

    /// Load the current snapshot, `None` if nothing has been saved yet
    async fn load<S>(&self) -> Result<Option<Snapshot<S>>>
    where
        S: DeserializeOwned + Send;

    /// Human readable location, used in log lines
    fn location(&self) -> String;
}

/// Single-file snapshot store
pub struct LocalSnapshotStore {
    config: PersistenceConfig,
}

impl LocalSnapshotStore {
    /// Create a new local store
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(PersistenceError::config)?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.config.snapshot_path
    }
}

#[async_trait::async_trait]
impl SnapshotStore for LocalSnapshotStore {
    async fn save<S>(&self, state: S) -> Result<Snapshot<S>>
    where
        S: Serialize + Send + Sync,
    {
        let snapshot = Snapshot::new(state, self.config.compress);
        let bytes = snapshot::encode(&snapshot, &self.config)?;

        if let Some(parent) = self.config.snapshot_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write next to the target and rename so a crash never leaves a torn file
        let temp_path = self.config.temp_path();
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, &self.config.snapshot_path).await?;

        tracing::info!(
            "Saved snapshot {} to {:?} ({} bytes)",
            snapshot.id,
            self.config.snapshot_path,
            bytes.len()
        );

        Ok(snapshot)
    }

    async fn load<S>(&self) -> Result<Option<Snapshot<S>>>
    where
        S: DeserializeOwned + Send,
    {
        let bytes = match tokio::fs::read(&self.config.snapshot_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No snapshot found at {:?}", self.config.snapshot_path);
                return Ok(None);
            }
            Err(e) => return Err(PersistenceError::Io(e)),
        };

        let snapshot = snapshot::decode(&bytes)?;
        tracing::info!(
            "Loaded snapshot {} taken at {} from {:?}",
            snapshot.id,
            snapshot.timestamp,
            self.config.snapshot_path
        );

        Ok(Some(snapshot))
    }

    fn location(&self) -> String {
        self.config.snapshot_path.display().to_string()
    }
}

/// In-memory snapshot store. Holds the encoded bytes so loads go through
/// the same decode path as the file store.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl InMemorySnapshotStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with raw bytes (useful for corruption tests)
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    /// Whether a snapshot has been saved
    pub async fn is_empty(&self) -> bool {
        self.bytes.lock().await.is_none()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save<S>(&self, state: S) -> Result<Snapshot<S>>
    where
        S: Serialize + Send + Sync,
    {
        let snapshot = Snapshot::new(state, false);
        let bytes = serde_json::to_vec(&snapshot)?;
        *self.bytes.lock().await = Some(bytes);
        Ok(snapshot)
    }

    async fn load<S>(&self) -> Result<Option<Snapshot<S>>>
    where
        S: DeserializeOwned + Send,
    {
        let guard = self.bytes.lock().await;
        match guard.as_deref() {
            Some(bytes) => Ok(Some(snapshot::decode(bytes)?)),
            None => Ok(None),
        }
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
