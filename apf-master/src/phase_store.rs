//! ── Phase Store ────────────────────────────────────────────────────────────
//!
//! Durable single-valued cursor enumerating the nightly pipeline stage, plus
//! two companion values persisted alongside it: the fixed-list path
//! compared on `--fixed` changes, and the scriptobs lines-done count.
//! Every `set` writes to a temp file and renames over the target so a crash
//! mid-write never leaves a half-written cursor behind.

use std::path::{Path, PathBuf};

use anyhow::Result;
use apf_types::Phase;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRecord {
    phase: String,
    fixed_list_var: Option<String>,
    lines_done: u32,
}

impl Default for StoredRecord {
    fn default() -> Self {
        Self {
            phase: Phase::ObsInfo.to_string(),
            fixed_list_var: None,
            lines_done: 0,
        }
    }
}

/// A durable cursor over one JSON file. Single writer (the Sequencer and
/// Watcher), many tolerated readers.
pub struct PhaseStore {
    path: PathBuf,
}

impl PhaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_record(&self) -> StoredRecord {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("phase store at {} was corrupt ({e}), resetting to ObsInfo", self.path.display());
                StoredRecord::default()
            }),
            Err(_) => StoredRecord::default(),
        }
    }

    fn write_record(&self, record: &StoredRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Unknown values on read coerce to `ObsInfo` rather than failing.
    pub fn get_phase(&self) -> Phase {
        Phase::from_stored(&self.read_record().phase)
    }

    /// Durable before returning: write to a sibling temp file, then rename
    /// into place.
    pub fn set_phase(&self, phase: Phase) -> Result<()> {
        let mut record = self.read_record();
        record.phase = phase.to_string();
        self.write_record(&record)
    }

    pub fn get_fixed_list_var(&self) -> Option<String> {
        self.read_record().fixed_list_var
    }

    pub fn set_fixed_list_var(&self, value: Option<String>) -> Result<()> {
        let mut record = self.read_record();
        record.fixed_list_var = value;
        self.write_record(&record)
    }

    pub fn get_lines_done(&self) -> u32 {
        self.read_record().lines_done
    }

    pub fn set_lines_done(&self, lines_done: u32) -> Result<()> {
        let mut record = self.read_record();
        record.lines_done = lines_done;
        self.write_record(&record)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_value_on_disk_coerces_to_obsinfo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phase_store.json");
        std::fs::write(&path, "not json at all").unwrap();

        let store = PhaseStore::new(&path);
        assert_eq!(store.get_phase(), Phase::ObsInfo);
    }

    #[test]
    fn set_then_get_round_trips_across_a_fresh_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phase_store.json");

        let store = PhaseStore::new(&path);
        store.set_phase(Phase::Watching).unwrap();
        store.set_lines_done(7).unwrap();

        // A brand-new PhaseStore over the same path simulates a process
        // restart: the durable write must already be visible.
        let reopened = PhaseStore::new(&path);
        assert_eq!(reopened.get_phase(), Phase::Watching);
        assert_eq!(reopened.get_lines_done(), 7);
    }

    #[test]
    fn missing_file_defaults_to_obsinfo_and_zero_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        let store = PhaseStore::new(&path);
        assert_eq!(store.get_phase(), Phase::ObsInfo);
        assert_eq!(store.get_lines_done(), 0);
    }
}
