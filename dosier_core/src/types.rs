//! Core domain types for the Dosier medication tracker.
//!
//! This module defines the fundamental types used throughout the system:
//! - Medications and their schedule parameters
//! - Scheduled dose instances and their status lifecycle
//! - Dose records handed to the persistence collaborator

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Medication
// ============================================================================

/// A medication as stored in the roster.
///
/// The tracking engine treats this as an immutable snapshot per scheduling
/// pass; only the take-dose flow mutates stock and the paused flag.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Medication {
    pub id: String,
    pub name: String,
    /// Fixed doses per day; 0 means occasional use with no schedule
    pub daily_dose_count: u32,
    /// Time of the first daily dose; required whenever `daily_dose_count > 0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_dose_time: Option<NaiveTime>,
    /// Total treatment length in days; `None` means chronic/unbounded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_days: Option<u32>,
    /// Date the treatment started; used to clamp the alarm lookahead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub treatment_started_on: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub current_stock: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

impl Medication {
    /// Whether the medication follows a fixed daily schedule
    pub fn has_schedule(&self) -> bool {
        self.daily_dose_count > 0
    }

    /// Treatment days still ahead as of `today`, or `None` for chronic
    /// medications.
    ///
    /// Without a recorded start date the full configured length counts as
    /// remaining.
    pub fn remaining_treatment_days(&self, today: NaiveDate) -> Option<u32> {
        let total = self.treatment_days?;
        let elapsed = match self.treatment_started_on {
            Some(start) => (today - start).num_days().max(0) as u32,
            None => 0,
        };
        Some(total.saturating_sub(elapsed))
    }
}

// ============================================================================
// Scheduled doses
// ============================================================================

/// Lifecycle status of a scheduled dose.
///
/// Time drives `Pending → YellowAlert → RedAlert → Delayed → Omitted`;
/// `Taken` is a side transition out of any non-terminal status. `Omitted`
/// and `Taken` are terminal.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoseStatus {
    Pending,
    YellowAlert,
    RedAlert,
    Delayed,
    Omitted,
    Taken,
}

impl DoseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DoseStatus::Omitted | DoseStatus::Taken)
    }

    /// Position along the time-driven chain; used to enforce advance-only
    /// recomputes. `Taken` sits above everything because nothing may follow
    /// it.
    pub(crate) fn rank(self) -> u8 {
        match self {
            DoseStatus::Pending => 0,
            DoseStatus::YellowAlert => 1,
            DoseStatus::RedAlert => 2,
            DoseStatus::Delayed => 3,
            DoseStatus::Omitted => 4,
            DoseStatus::Taken => 5,
        }
    }
}

/// One expected intake event: a slot of a medication bound to today's date.
///
/// `slot` is the stable time-of-day label; `scheduled_at` starts as the slot
/// on today's date and moves forward when the dose is postponed. Instances
/// live for a single day and are regenerated on the next.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduledDose {
    pub medication_id: String,
    pub slot: NaiveTime,
    pub scheduled_at: NaiveDateTime,
    pub status: DoseStatus,
    pub postponements: u8,
    pub taken: bool,
    pub yellow_alert_at: Option<NaiveDateTime>,
    pub red_alert_at: Option<NaiveDateTime>,
    pub delayed_at: Option<NaiveDateTime>,
    pub omitted_at: Option<NaiveDateTime>,
}

impl ScheduledDose {
    pub fn new(medication_id: impl Into<String>, slot: NaiveTime, scheduled_at: NaiveDateTime) -> Self {
        Self {
            medication_id: medication_id.into(),
            slot,
            scheduled_at,
            status: DoseStatus::Pending,
            postponements: 0,
            taken: false,
            yellow_alert_at: None,
            red_alert_at: None,
            delayed_at: None,
            omitted_at: None,
        }
    }
}

/// Which of the two pre-dose alerts an armed timer stands for
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Yellow,
    Red,
}

// ============================================================================
// Dose records (persistence payload)
// ============================================================================

/// Terminal outcome of a dose as persisted to the history log
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Taken,
    Omitted,
}

/// A persisted dose outcome, handed to the persistence collaborator when a
/// dose is taken (or registered as omitted)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DoseRecord {
    pub id: Uuid,
    pub medication_id: String,
    pub medication_name: String,
    pub scheduled_at: NaiveDateTime,
    pub taken_at: NaiveDateTime,
    pub status: RecordStatus,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn med(treatment_days: Option<u32>, started: Option<NaiveDate>) -> Medication {
        Medication {
            id: "amoxicillin".into(),
            name: "Amoxicillin 500mg".into(),
            daily_dose_count: 2,
            first_dose_time: NaiveTime::from_hms_opt(8, 0, 0),
            treatment_days,
            treatment_started_on: started,
            active: true,
            paused: false,
            current_stock: 14,
            expiration_date: None,
        }
    }

    #[test]
    fn remaining_days_chronic_is_none() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert_eq!(med(None, None).remaining_treatment_days(today), None);
    }

    #[test]
    fn remaining_days_subtracts_elapsed() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(
            med(Some(7), Some(started)).remaining_treatment_days(today),
            Some(4)
        );
    }

    #[test]
    fn remaining_days_saturates_at_zero() {
        let started = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
        assert_eq!(
            med(Some(7), Some(started)).remaining_treatment_days(today),
            Some(0)
        );
    }

    #[test]
    fn terminal_statuses() {
        assert!(DoseStatus::Taken.is_terminal());
        assert!(DoseStatus::Omitted.is_terminal());
        assert!(!DoseStatus::Delayed.is_terminal());
        assert!(!DoseStatus::Pending.is_terminal());
    }
}
