//! Persistence collaborator: medication roster and dose record sink.
//!
//! The tracking engine only ever sees this trait; the file-backed
//! implementation below keeps the roster in a TOML file and appends dose
//! records to the JSONL log.

use crate::log::{DoseRecordSink, JsonlSink};
use crate::{DoseRecord, Error, Medication, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Narrow interface over the medication/dose backing store
pub trait Persistence {
    fn medication(&self, id: &str) -> Result<Option<Medication>>;
    fn active_medications(&self) -> Result<Vec<Medication>>;
    fn record_dose_taken(&mut self, record: &DoseRecord) -> Result<()>;
}

/// Roster file format: a list of `[[medications]]` tables
#[derive(Debug, Default, Serialize, Deserialize)]
struct RosterFile {
    #[serde(default)]
    medications: Vec<Medication>,
}

/// File-backed store: TOML roster plus JSONL dose log
pub struct FileStore {
    roster_path: PathBuf,
    medications: Vec<Medication>,
    sink: JsonlSink,
}

impl FileStore {
    /// Open the store, loading the roster eagerly.
    ///
    /// A missing roster file is an empty roster, not an error.
    pub fn open(roster_path: &Path, log_path: impl Into<PathBuf>) -> Result<Self> {
        let medications = if roster_path.exists() {
            let contents = std::fs::read_to_string(roster_path)?;
            let roster: RosterFile = toml::from_str(&contents)?;
            tracing::info!(
                "Loaded {} medication(s) from {:?}",
                roster.medications.len(),
                roster_path
            );
            roster.medications
        } else {
            tracing::info!("No roster file at {:?}, starting empty", roster_path);
            Vec::new()
        };

        Ok(Self {
            roster_path: roster_path.to_path_buf(),
            medications,
            sink: JsonlSink::new(log_path),
        })
    }

    /// Write the roster back out (stock and paused flags change on takes).
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn persist_roster(&self) -> Result<()> {
        if let Some(parent) = self.roster_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = tempfile::NamedTempFile::new_in(self.roster_path.parent().ok_or_else(
            || std::io::Error::new(std::io::ErrorKind::Other, "roster path missing parent"),
        )?)?;

        let roster = RosterFile {
            medications: self.medications.clone(),
        };
        let contents = toml::to_string_pretty(&roster)
            .map_err(|e| Error::Store(format!("Failed to serialize roster: {}", e)))?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&self.roster_path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved roster to {:?}", self.roster_path);
        Ok(())
    }

    /// Every medication in the roster, active or not
    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    /// Mutable lookup, for the take-dose flow that updates stock
    pub fn medication_mut(&mut self, id: &str) -> Option<&mut Medication> {
        self.medications.iter_mut().find(|m| m.id == id)
    }
}

impl Persistence for FileStore {
    fn medication(&self, id: &str) -> Result<Option<Medication>> {
        Ok(self.medications.iter().find(|m| m.id == id).cloned())
    }

    fn active_medications(&self) -> Result<Vec<Medication>> {
        Ok(self
            .medications
            .iter()
            .filter(|m| m.active)
            .cloned()
            .collect())
    }

    fn record_dose_taken(&mut self, record: &DoseRecord) -> Result<()> {
        self.sink.append(record)
    }
}
