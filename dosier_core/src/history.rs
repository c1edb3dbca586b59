//! Dose history loading and adherence summary.
//!
//! Recent history comes from two places: the hot JSONL log and the CSV
//! archive produced by rollup. Records appearing in both are de-duplicated
//! by id.

use crate::{DoseRecord, RecordStatus, Result};
use chrono::{Duration, NaiveDateTime};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

/// CSV row format for reading archived records
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    medication_id: String,
    medication_name: String,
    scheduled_at: String,
    taken_at: String,
    status: String,
    notes: Option<String>,
}

impl TryFrom<CsvRow> for DoseRecord {
    type Error = crate::Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| crate::Error::Store(format!("Invalid UUID: {}", e)))?;

        let scheduled_at = parse_datetime(&row.scheduled_at)?;
        let taken_at = parse_datetime(&row.taken_at)?;

        let status = match row.status.as_str() {
            "taken" => RecordStatus::Taken,
            "omitted" => RecordStatus::Omitted,
            other => {
                return Err(crate::Error::Store(format!(
                    "Unknown record status '{}'",
                    other
                )))
            }
        };

        Ok(DoseRecord {
            id,
            medication_id: row.medication_id,
            medication_name: row.medication_name,
            scheduled_at,
            taken_at,
            status,
            notes: row.notes,
        })
    }
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| crate::Error::Store(format!("Invalid date '{}': {}", s, e)))
}

/// Load dose records from the last N days from both log and CSV archive.
///
/// Returns records sorted by taken_at (newest first), de-duplicated by id.
pub fn load_recent_records(
    log_path: &Path,
    csv_path: &Path,
    days: i64,
    now: NaiveDateTime,
) -> Result<Vec<DoseRecord>> {
    let cutoff = now - Duration::days(days);
    let mut records = Vec::new();
    let mut seen_ids = HashSet::new();

    if log_path.exists() {
        for record in crate::log::read_records(log_path)? {
            if record.taken_at >= cutoff {
                seen_ids.insert(record.id);
                records.push(record);
            }
        }
        tracing::debug!("Loaded {} record(s) from log", records.len());
    }

    if csv_path.exists() {
        let mut csv_count = 0;
        for record in load_records_from_csv(csv_path)? {
            if record.taken_at >= cutoff && !seen_ids.contains(&record.id) {
                seen_ids.insert(record.id);
                records.push(record);
                csv_count += 1;
            }
        }
        tracing::debug!("Loaded {} record(s) from CSV", csv_count);
    }

    records.sort_by(|a, b| b.taken_at.cmp(&a.taken_at));

    tracing::info!(
        "Loaded {} total dose record(s) from last {} days",
        records.len(),
        days
    );

    Ok(records)
}

/// Load all records from a CSV archive, skipping unparseable rows
fn load_records_from_csv(path: &Path) -> Result<Vec<DoseRecord>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut records = Vec::new();
    for result in reader.deserialize::<CsvRow>() {
        match result {
            Ok(row) => match DoseRecord::try_from(row) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!("Failed to parse CSV row: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to deserialize CSV row: {}", e);
            }
        }
    }

    Ok(records)
}

/// Taken-versus-omitted tally over a set of records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdherenceSummary {
    pub taken: usize,
    pub omitted: usize,
}

impl AdherenceSummary {
    /// Percentage of doses taken, or None when there is no history yet
    pub fn percentage(&self) -> Option<f64> {
        let total = self.taken + self.omitted;
        if total == 0 {
            return None;
        }
        Some(self.taken as f64 * 100.0 / total as f64)
    }
}

/// Summarize adherence across records (typically one history window)
pub fn adherence(records: &[DoseRecord]) -> AdherenceSummary {
    let mut summary = AdherenceSummary::default();
    for record in records {
        match record.status {
            RecordStatus::Taken => summary.taken += 1,
            RecordStatus::Omitted => summary.omitted += 1,
        }
    }
    summary
}
