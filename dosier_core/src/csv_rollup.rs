//! CSV rollup for archiving the dose log.
//!
//! The JSONL log is the hot append path; this module converts it into the
//! long-term CSV archive atomically so records survive without data loss.

use crate::{DoseRecord, RecordStatus, Result};
use std::fs::OpenOptions;
use std::path::Path;

/// A row in the CSV archive
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    id: String,
    medication_id: String,
    medication_name: String,
    scheduled_at: String,
    taken_at: String,
    status: String,
    notes: Option<String>,
}

impl From<&DoseRecord> for CsvRow {
    fn from(record: &DoseRecord) -> Self {
        CsvRow {
            id: record.id.to_string(),
            medication_id: record.medication_id.clone(),
            medication_name: record.medication_name.clone(),
            scheduled_at: record.scheduled_at.to_string(),
            taken_at: record.taken_at.to_string(),
            status: match record.status {
                RecordStatus::Taken => "taken".into(),
                RecordStatus::Omitted => "omitted".into(),
            },
            notes: record.notes.clone(),
        }
    }
}

/// Roll up log records into CSV and archive the log atomically.
///
/// 1. Reads all records from the JSONL log
/// 2. Appends them to the CSV file (writing headers if the file is new)
/// 3. Syncs the CSV to disk
/// 4. Renames the log to `.processed`
///
/// The CSV is fsynced before the log is renamed, and the log is renamed
/// rather than deleted so manual recovery stays possible.
pub fn log_to_csv_and_archive(log_path: &Path, csv_path: &Path) -> Result<usize> {
    let records = crate::log::read_records(log_path)?;

    if records.is_empty() {
        tracing::info!("No dose records in log to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for record in &records {
        writer.serialize(CsvRow::from(record))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    file.sync_all()?;

    tracing::info!("Wrote {} dose record(s) to CSV", records.len());

    let processed_path = log_path.with_extension("log.processed");
    std::fs::rename(log_path, &processed_path)?;

    tracing::info!("Archived dose log to {:?}", processed_path);

    Ok(records.len())
}

/// Remove all `.processed` logs in the given directory
pub fn cleanup_processed_logs(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if let Some(extension) = path.extension() {
            if extension == "processed" {
                std::fs::remove_file(&path)?;
                tracing::debug!("Removed processed log: {:?}", path);
                count += 1;
            }
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed log file(s)", count);
    }

    Ok(count)
}
