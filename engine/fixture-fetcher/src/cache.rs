//! Last-good snapshot cache.
//!
//! A run that aggregates zero fixtures almost always means the upstream was
//! down or rate limiting every request. In that case the previous successful
//! board is served instead of an empty page.

use crate::models::{BoardSource, MatchBoard};
use persistence::SnapshotStore;
use tracing::{info, warn};

/// Snapshot cache over any [`SnapshotStore`]
pub struct SnapshotCache<S: SnapshotStore> {
    store: S,
}

impl<S: SnapshotStore> SnapshotCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Overwrite the snapshot. Best effort: failures are logged and reported
    /// through the return value only.
    pub async fn save(&self, board: &MatchBoard) -> bool {
        match self.store.save(board.clone()).await {
            Ok(snapshot) => {
                info!(
                    "Saved snapshot {} with {} fixtures to {}",
                    snapshot.id,
                    board.total_fixtures(),
                    self.store.location()
                );
                true
            }
            Err(e) => {
                warn!("Failed to save snapshot to {}: {}", self.store.location(), e);
                false
            }
        }
    }

    /// Last saved board; `None` when missing, unreadable or malformed
    pub async fn load(&self) -> Option<MatchBoard> {
        match self.store.load::<MatchBoard>().await {
            Ok(Some(snapshot)) => {
                info!("Loaded snapshot {} taken at {}", snapshot.id, snapshot.timestamp);
                Some(snapshot.state)
            }
            Ok(None) => {
                info!("No snapshot at {}", self.store.location());
                None
            }
            Err(e) => {
                warn!("Ignoring unreadable snapshot at {}: {}", self.store.location(), e);
                None
            }
        }
    }

    /// Pick the board to publish.
    ///
    /// A non-empty fresh board is saved and returned. An empty one is replaced
    /// by the cached board when there is one, and returned as-is otherwise.
    pub async fn get_matches(&self, fresh: MatchBoard) -> (MatchBoard, BoardSource) {
        if !fresh.is_empty() {
            self.save(&fresh).await;
            return (fresh, BoardSource::Fresh);
        }

        warn!("Fresh fetch produced no fixtures, falling back to the last snapshot");
        match self.load().await {
            Some(cached) => (cached, BoardSource::Cache),
            None => (fresh, BoardSource::Empty),
        }
    }
}
