//! Raw payload dump for upstream schema inspection.
//!
//! When enabled, the first record, the first participant and the first
//! tournament object seen in a run are written to fixed files so the shape the
//! API currently returns can be checked by hand. Each file is written once,
//! from the first record that carries that part.

use crate::error::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RECORD_FILE: &str = "first_record.json";
pub const PARTICIPANT_FILE: &str = "first_participant.json";
pub const TOURNAMENT_FILE: &str = "first_tournament.json";

/// Writes the first raw record, participant and tournament of a run
#[derive(Debug)]
pub struct DebugDump {
    dir: PathBuf,
    record_done: bool,
    participant_done: bool,
    tournament_done: bool,
}

impl DebugDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            record_done: false,
            participant_done: false,
            tournament_done: false,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True once every part has been dumped (or attempted)
    pub fn is_complete(&self) -> bool {
        self.record_done && self.participant_done && self.tournament_done
    }

    /// Dump whichever parts have not been dumped yet in this run
    pub async fn capture(
        &mut self,
        record: &Value,
        participant: Option<&Value>,
        tournament: Option<&Value>,
    ) -> Result<()> {
        if self.is_complete() {
            return Ok(());
        }
        tokio::fs::create_dir_all(&self.dir).await?;

        // One attempt per part, even if the write fails
        if !self.record_done {
            self.record_done = true;
            self.write(RECORD_FILE, record).await?;
        }
        if let Some(participant) = participant.filter(|_| !self.participant_done) {
            self.participant_done = true;
            self.write(PARTICIPANT_FILE, participant).await?;
        }
        if let Some(tournament) = tournament.filter(|_| !self.tournament_done) {
            self.tournament_done = true;
            self.write(TOURNAMENT_FILE, tournament).await?;
        }
        Ok(())
    }

    async fn write(&self, file: &str, value: &Value) -> Result<()> {
        let path = self.dir.join(file);
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&path, bytes).await?;
        info!("Wrote raw payload dump {}", path.display());
        Ok(())
    }
}
