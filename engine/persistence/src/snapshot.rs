//! Snapshot of the last successful state
//!
//! A snapshot is a "photo" of a state value taken after a successful run. It is
//! never modified after it has been written; the next successful run replaces
//! it wholesale.

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use uuid::Uuid;

/// Current on-disk format version
pub const SNAPSHOT_VERSION: &str = "1.0";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A snapshot of some state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot<S> {
    /// Unique identifier for this snapshot
    pub id: Uuid,

    /// Timestamp when the snapshot was created
    pub timestamp: DateTime<Utc>,

    /// The captured state
    pub state: S,

    /// Metadata about the snapshot
    pub metadata: SnapshotMetadata,
}

/// Snapshot metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMetadata {
    /// Snapshot version
    pub version: String,

    /// Compression used
    pub compression: Option<String>,
}

impl<S> Snapshot<S> {
    /// Wrap a state value in a fresh snapshot
    pub fn new(state: S, compressed: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            state,
            metadata: SnapshotMetadata {
                version: SNAPSHOT_VERSION.to_string(),
                compression: if compressed { Some("gzip".to_string()) } else { None },
            },
        }
    }
}

/// Serialize a snapshot into the bytes written to disk
pub fn encode<S: Serialize>(snapshot: &Snapshot<S>, config: &PersistenceConfig) -> Result<Vec<u8>> {
    if config.compress {
        let json = serde_json::to_vec(snapshot)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        return Ok(encoder.finish()?);
    }

    if config.pretty {
        Ok(serde_json::to_vec_pretty(snapshot)?)
    } else {
        Ok(serde_json::to_vec(snapshot)?)
    }
}

/// Parse bytes read from disk. Gzip input is detected by its magic header.
pub fn decode<S: DeserializeOwned>(bytes: &[u8]) -> Result<Snapshot<S>> {
    if bytes.is_empty() {
        return Err(PersistenceError::corruption("snapshot file is empty"));
    }

    let snapshot: Snapshot<S> = if bytes.starts_with(&GZIP_MAGIC) {
        let mut json = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut json)?;
        serde_json::from_slice(&json)?
    } else {
        serde_json::from_slice(bytes)?
    };

    if snapshot.metadata.version != SNAPSHOT_VERSION {
        return Err(PersistenceError::corruption(format!(
            "unsupported snapshot version {}",
            snapshot.metadata.version
        )));
    }

    Ok(snapshot)
}
