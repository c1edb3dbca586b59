//! Take-dose orchestration across tracker, stock and persistence.
//!
//! The flow validates first, then persists, then mutates: a rejected take
//! leaves everything untouched, and a persisted record always corresponds
//! to a tracker transition.

use crate::store::Persistence;
use crate::{
    DoseRecord, DoseTracker, Medication, RecordStatus, Result, ScheduledDose, ValidationError,
};
use chrono::{NaiveDateTime, NaiveTime};
use uuid::Uuid;

/// What taking a dose accomplished
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TakeOutcome {
    /// The slot that was taken
    pub slot: NaiveTime,
    /// The whole daily schedule is now satisfied
    pub all_taken_today: bool,
    /// Stock ran out; the medication was paused
    pub treatment_completed: bool,
    /// Stock remaining after this dose
    pub stock_left: u32,
}

/// Take a dose of a medication: validate the window, persist the record,
/// mark it in the tracker, consume stock, and pause the medication if the
/// stock ran out.
///
/// With `slot = None` the dose closest to `now` that is inside its take
/// window is chosen; this is the "take now" button on the dashboard.
pub fn record_taken_dose<S: Persistence>(
    tracker: &DoseTracker,
    store: &mut S,
    med: &mut Medication,
    slot: Option<NaiveTime>,
    now: NaiveDateTime,
) -> Result<TakeOutcome> {
    let slot = match slot {
        Some(s) => s,
        None => resolve_slot(tracker, &med.id, now)?,
    };

    // Validate against a snapshot so a persistence failure cannot leave the
    // tracker marked but the record unwritten
    let doses = tracker.dose_states(&med.id, now);
    let mut probe = doses
        .iter()
        .find(|d| d.slot == slot)
        .cloned()
        .ok_or(ValidationError::DoseNotFound)?;
    probe.mark_taken(now)?;

    let record = DoseRecord {
        id: Uuid::new_v4(),
        medication_id: med.id.clone(),
        medication_name: med.name.clone(),
        scheduled_at: probe.scheduled_at,
        taken_at: now,
        status: RecordStatus::Taken,
        notes: Some("recorded from the dashboard".into()),
    };
    store.record_dose_taken(&record)?;

    tracker.mark_taken(&med.id, slot, now)?;

    crate::stock::consume_dose(med);
    let treatment_completed = med.current_stock == 0;
    if treatment_completed {
        med.paused = true;
        tracing::info!("Medication '{}' depleted its stock; pausing", med.id);
    }

    Ok(TakeOutcome {
        slot,
        all_taken_today: tracker.all_taken_today(&med.id),
        treatment_completed,
        stock_left: med.current_stock,
    })
}

/// Pick the slot to take when the caller didn't name one
fn resolve_slot(tracker: &DoseTracker, med_id: &str, now: NaiveDateTime) -> Result<NaiveTime> {
    if let Some(dose) = tracker.next_actionable_dose(med_id, now) {
        return Ok(dose.slot);
    }

    // Nothing takeable right now; pick the first pending dose so the caller
    // gets the precise rejection (too early, expired, ...)
    let doses = tracker.dose_states(med_id, now);
    if doses.is_empty() {
        return Err(ValidationError::DoseNotFound.into());
    }
    match doses.iter().find(|d| !d.taken) {
        Some(dose) => Ok(dose.slot),
        None => Err(ValidationError::AlreadyTaken.into()),
    }
}

/// Register a swept (missed) dose in the history log
pub fn record_omitted_dose<S: Persistence>(
    store: &mut S,
    med: &Medication,
    dose: &ScheduledDose,
    now: NaiveDateTime,
) -> Result<()> {
    store.record_dose_taken(&DoseRecord {
        id: Uuid::new_v4(),
        medication_id: med.id.clone(),
        medication_name: med.name.clone(),
        scheduled_at: dose.scheduled_at,
        taken_at: now,
        status: RecordStatus::Omitted,
        notes: None,
    })
}
