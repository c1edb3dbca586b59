//! Append-only dose history log.
//!
//! Dose records are appended to a JSONL (JSON Lines) file with file locking
//! so the foreground app and a background checker can write safely.

use crate::{DoseRecord, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Sink for persisting dose records
pub trait DoseRecordSink {
    fn append(&mut self, record: &DoseRecord) -> Result<()>;
}

/// JSONL-based record sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DoseRecordSink for JsonlSink {
    fn append(&mut self, record: &DoseRecord) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended dose record {} to log", record.id);
        Ok(())
    }
}

/// Read all dose records from a log file.
///
/// Malformed lines are skipped with a warning rather than failing the whole
/// read.
pub fn read_records(path: &Path) -> Result<Vec<DoseRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<DoseRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse dose record at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} dose record(s) from log", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordStatus;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn record(name: &str) -> DoseRecord {
        let scheduled = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        DoseRecord {
            id: Uuid::new_v4(),
            medication_id: name.to_lowercase(),
            medication_name: name.into(),
            scheduled_at: scheduled,
            taken_at: scheduled + chrono::Duration::minutes(5),
            status: RecordStatus::Taken,
            notes: None,
        }
    }

    #[test]
    fn append_and_read_single_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("doses.log");

        let rec = record("Amoxicillin");
        let id = rec.id;

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&rec).unwrap();

        let records = read_records(&log_path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
    }

    #[test]
    fn append_multiple_records() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("doses.log");

        let mut sink = JsonlSink::new(&log_path);
        for _ in 0..5 {
            sink.append(&record("Ibuprofen")).unwrap();
        }

        assert_eq!(read_records(&log_path).unwrap().len(), 5);
    }

    #[test]
    fn read_missing_log_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let records = read_records(&temp_dir.path().join("nonexistent.log")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("doses.log");

        let mut sink = JsonlSink::new(&log_path);
        sink.append(&record("Amoxicillin")).unwrap();

        let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
        writeln!(file, "{{ not json").unwrap();

        sink.append(&record("Ibuprofen")).unwrap();

        assert_eq!(read_records(&log_path).unwrap().len(), 2);
    }
}
