//! # Persistence Layer
//!
//! This crate keeps the last successful state of a batch job on disk so the
//! next run can fall back to it when the upstream data source is unavailable.
//!
//! ## Architecture
//!
//! - **SnapshotStore**: Abstract trait for different storage backends
//! - **LocalSnapshotStore**: Single-file implementation (JSON, optionally gzip)
//! - **InMemorySnapshotStore**: Volatile implementation for tests and dry runs
//! - **Snapshot**: Immutable capture of a state value with id and timestamp
//!
//! Only one snapshot exists at a time. Saving replaces the previous one wholesale.
//!
//! ## Usage
//!
//! ```rust
//! use persistence::{create_local_store, SnapshotStore};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let store = create_local_store(temp_dir.path().join("last_good.json"))?;
//!
//!     store.save(vec!["Sinner vs Alcaraz".to_string()]).await?;
//!     let snapshot = store.load::<Vec<String>>().await?;
//!     assert_eq!(snapshot.map(|s| s.state.len()), Some(1));
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod snapshot;

pub use backend::{InMemorySnapshotStore, LocalSnapshotStore, SnapshotStore};
pub use config::PersistenceConfig;
pub use error::{PersistenceError, Result};
pub use local::{create_local_store, create_local_store_with_config};
pub use snapshot::{Snapshot, SnapshotMetadata};

pub use chrono::{DateTime, Utc};
/// Re-export common types for convenience
pub use serde::{Deserialize, Serialize};
pub use uuid::Uuid;
