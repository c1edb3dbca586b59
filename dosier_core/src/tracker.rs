//! In-memory store of today's scheduled doses, keyed by medication.
//!
//! The tracker is the single owner of dose state. It is called from the
//! foreground UI and from periodic background rechecks, so the map is
//! mutex-guarded; the original design left this unsynchronized and relied on
//! luck. All operations are synchronous: status is recomputed lazily against
//! the wall clock on read, never by internal timers.

use crate::schedule::materialize_today;
use crate::{Medication, Result, ScheduledDose, ValidationError};
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Local time from which the day-boundary sweep is allowed to run.
/// Midnight doses keep a 00:01–01:00 grace window before being swept.
const SWEEP_FROM_MINUTES: u32 = 61;

#[derive(Debug, Default)]
pub struct DoseTracker {
    doses: Mutex<HashMap<String, Vec<ScheduledDose>>>,
}

impl DoseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Vec<ScheduledDose>>> {
        // A poisoned lock only means another caller panicked mid-update;
        // the map itself is still usable.
        self.doses.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// (Re)initialize today's dose instances for a medication.
    ///
    /// Existing instances still belonging to today survive with their
    /// postponements and taken flags; stale ones are dropped; missing slots
    /// are created fresh. Returns how many instances are now live.
    pub fn initialize_todays_schedule(
        &self,
        med: &Medication,
        now: NaiveDateTime,
    ) -> Result<usize> {
        let mut map = self.guard();
        let existing = map.get(&med.id).map(Vec::as_slice).unwrap_or(&[]);
        let doses = materialize_today(med, existing, now)?;

        let count = doses.len();
        if doses.is_empty() {
            map.remove(&med.id);
        } else {
            map.insert(med.id.clone(), doses);
        }

        tracing::debug!(
            "Initialized {} dose(s) for medication '{}'",
            count,
            med.id
        );
        Ok(count)
    }

    /// Forget a medication's doses entirely (deleted or deactivated)
    pub fn remove_medication(&self, medication_id: &str) {
        self.guard().remove(medication_id);
    }

    /// Current dose states for a medication, statuses advanced to `now`
    pub fn dose_states(&self, medication_id: &str, now: NaiveDateTime) -> Vec<ScheduledDose> {
        let mut map = self.guard();
        match map.get_mut(medication_id) {
            Some(doses) => {
                for dose in doses.iter_mut() {
                    dose.advance(now);
                }
                doses.clone()
            }
            None => Vec::new(),
        }
    }

    /// Mark the dose at `slot` as taken. Returns a snapshot of the taken
    /// instance for record building.
    pub fn mark_taken(
        &self,
        medication_id: &str,
        slot: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<ScheduledDose> {
        let mut map = self.guard();
        let dose = map
            .get_mut(medication_id)
            .and_then(|doses| doses.iter_mut().find(|d| d.slot == slot))
            .ok_or(ValidationError::DoseNotFound)?;

        dose.mark_taken(now)?;
        tracing::info!(
            "Dose {} of medication '{}' marked as taken",
            slot,
            medication_id
        );
        Ok(dose.clone())
    }

    /// Postpone the dose at `slot` 10 minutes. Returns the remaining
    /// postponements on success; a fourth attempt fails and omits the dose.
    pub fn postpone(
        &self,
        medication_id: &str,
        slot: NaiveTime,
        now: NaiveDateTime,
    ) -> Result<u8> {
        let mut map = self.guard();
        let dose = map
            .get_mut(medication_id)
            .and_then(|doses| doses.iter_mut().find(|d| d.slot == slot))
            .ok_or(ValidationError::DoseNotFound)?;

        let remaining = dose.postpone(now)?;
        tracing::info!(
            "Dose {} of medication '{}' postponed to {} ({} postponement(s) left)",
            slot,
            medication_id,
            dose.scheduled_at,
            remaining
        );
        Ok(remaining)
    }

    /// Day-boundary maintenance: once local time reaches 01:01, force every
    /// non-terminal dose of today whose scheduled time has already passed to
    /// `Omitted`. Runs as a no-op earlier so a 00:00 dose keeps its grace
    /// window. Returns snapshots of the doses swept, so callers can register
    /// them as omitted in the history log.
    pub fn sweep_missed_doses(&self, now: NaiveDateTime) -> Vec<ScheduledDose> {
        if now.time().hour() * 60 + now.time().minute() < SWEEP_FROM_MINUTES {
            return Vec::new();
        }

        let today = now.date();
        let mut swept = Vec::new();
        let mut map = self.guard();
        for doses in map.values_mut() {
            for dose in doses.iter_mut() {
                if !dose.status.is_terminal()
                    && dose.scheduled_at.date() == today
                    && dose.scheduled_at < now
                {
                    dose.force_omit(now);
                    swept.push(dose.clone());
                }
            }
        }

        if !swept.is_empty() {
            tracing::info!("Swept {} missed dose(s) after 01:01", swept.len());
        }
        swept
    }

    /// The dose closest to `now` that can be taken right now, if any.
    /// Used when the caller asks to take a medication without naming a slot.
    pub fn next_actionable_dose(
        &self,
        medication_id: &str,
        now: NaiveDateTime,
    ) -> Option<ScheduledDose> {
        let map = self.guard();
        map.get(medication_id)?
            .iter()
            .filter(|d| d.scheduled_at.date() == now.date() && d.in_take_window(now))
            .min_by_key(|d| (d.scheduled_at - now).num_minutes().abs())
            .cloned()
    }

    /// Whether every one of today's doses has been taken. An empty or
    /// uninitialized schedule does not count as complete.
    pub fn all_taken_today(&self, medication_id: &str) -> bool {
        let map = self.guard();
        match map.get(medication_id) {
            Some(doses) if !doses.is_empty() => doses.iter().all(|d| d.taken),
            _ => false,
        }
    }

    /// Whether the medication has a 00:00-slot dose that is still inside its
    /// omitted window. Drives the 00:01–01:00 dashboard rule.
    pub fn has_actionable_midnight_dose(&self, medication_id: &str, now: NaiveDateTime) -> bool {
        let midnight = NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default();
        let map = self.guard();
        map.get(medication_id)
            .map(|doses| {
                doses.iter().any(|d| {
                    d.slot == midnight
                        && !d.taken
                        && d.status != crate::DoseStatus::Omitted
                        && now < d.omitted_deadline()
                })
            })
            .unwrap_or(false)
    }

    /// Whether the medication has any dose instances materialized
    pub fn has_doses(&self, medication_id: &str) -> bool {
        self.guard()
            .get(medication_id)
            .is_some_and(|d| !d.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DoseStatus, Error};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn med(count: u32, first: &str) -> Medication {
        Medication {
            id: "amoxicillin".into(),
            name: "Amoxicillin 500mg".into(),
            daily_dose_count: count,
            first_dose_time: Some(first.parse().unwrap()),
            treatment_days: Some(7),
            treatment_started_on: None,
            active: true,
            paused: false,
            current_stock: 14,
            expiration_date: None,
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_time(s.parse().unwrap())
    }

    fn slot(s: &str) -> NaiveTime {
        s.parse().unwrap()
    }

    #[test]
    fn initialize_then_read_states() {
        let tracker = DoseTracker::new();
        let n = tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();
        assert_eq!(n, 2);

        let states = tracker.dose_states("amoxicillin", at("07:55:00"));
        assert_eq!(states[0].status, DoseStatus::YellowAlert);
        assert_eq!(states[1].status, DoseStatus::Pending);
    }

    #[test]
    fn reinitialize_preserves_postponements() {
        let tracker = DoseTracker::new();
        let m = med(2, "08:00:00");
        tracker.initialize_todays_schedule(&m, at("07:00:00")).unwrap();
        tracker.postpone("amoxicillin", slot("08:00:00"), at("07:55:00")).unwrap();

        tracker.initialize_todays_schedule(&m, at("08:30:00")).unwrap();
        let states = tracker.dose_states("amoxicillin", at("08:05:00"));
        assert_eq!(states[0].postponements, 1);
        assert_eq!(states[0].scheduled_at, at("08:10:00"));
    }

    #[test]
    fn mark_taken_unknown_medication_is_not_found() {
        let tracker = DoseTracker::new();
        let err = tracker
            .mark_taken("nope", slot("08:00:00"), at("08:00:00"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DoseNotFound)
        ));
    }

    #[test]
    fn mark_taken_unknown_slot_is_not_found() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();
        let err = tracker
            .mark_taken("amoxicillin", slot("12:00:00"), at("08:00:00"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::DoseNotFound)
        ));
    }

    #[test]
    fn take_then_take_again_fails() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();

        tracker
            .mark_taken("amoxicillin", slot("08:00:00"), at("08:05:00"))
            .unwrap();
        let err = tracker
            .mark_taken("amoxicillin", slot("08:00:00"), at("08:06:00"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::AlreadyTaken)
        ));
    }

    #[test]
    fn sweep_is_noop_before_0101() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(1, "00:00:00"), at("00:05:00"))
            .unwrap();

        assert!(tracker.sweep_missed_doses(at("00:30:00")).is_empty());
        let states = tracker.dose_states("amoxicillin", at("00:30:00"));
        assert_ne!(states[0].status, DoseStatus::Omitted);
    }

    #[test]
    fn sweep_omits_passed_doses_after_0101() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "00:30:00"), at("00:45:00"))
            .unwrap();

        let swept = tracker.sweep_missed_doses(at("01:01:00"));
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].slot, slot("00:30:00"));

        let states = tracker.dose_states("amoxicillin", at("01:01:00"));
        assert_eq!(states[0].status, DoseStatus::Omitted);
        // The 12:00 dose is still in the future and untouched
        assert_eq!(states[1].status, DoseStatus::Pending);
    }

    #[test]
    fn sweep_skips_terminal_doses() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(1, "06:00:00"), at("06:00:00"))
            .unwrap();
        tracker
            .mark_taken("amoxicillin", slot("06:00:00"), at("06:00:00"))
            .unwrap();

        assert!(tracker.sweep_missed_doses(at("07:30:00")).is_empty());
    }

    #[test]
    fn midnight_dose_grace_window() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(1, "00:00:00"), at("00:05:00"))
            .unwrap();

        assert!(tracker.has_actionable_midnight_dose("amoxicillin", at("00:30:00")));
        // Deadline is 01:00; past it the dose is no longer actionable
        assert!(!tracker.has_actionable_midnight_dose("amoxicillin", at("01:00:00")));
    }

    #[test]
    fn all_taken_today_requires_every_dose() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();

        assert!(!tracker.all_taken_today("amoxicillin"));
        tracker
            .mark_taken("amoxicillin", slot("08:00:00"), at("08:00:00"))
            .unwrap();
        assert!(!tracker.all_taken_today("amoxicillin"));
        tracker
            .mark_taken("amoxicillin", slot("20:00:00"), at("20:00:00"))
            .unwrap();
        assert!(tracker.all_taken_today("amoxicillin"));
    }

    #[test]
    fn all_taken_today_is_false_without_doses() {
        let tracker = DoseTracker::new();
        assert!(!tracker.all_taken_today("amoxicillin"));
    }

    #[test]
    fn next_actionable_picks_closest_dose() {
        let tracker = DoseTracker::new();
        // Slots 08:00 and 20:00; at 08:30 only the morning dose is takeable
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();

        let dose = tracker
            .next_actionable_dose("amoxicillin", at("08:30:00"))
            .unwrap();
        assert_eq!(dose.slot, slot("08:00:00"));
    }

    #[test]
    fn next_actionable_none_outside_windows() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();

        assert!(tracker
            .next_actionable_dose("amoxicillin", at("06:00:00"))
            .is_none());
    }

    #[test]
    fn occasional_medication_clears_entry() {
        let tracker = DoseTracker::new();
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();
        assert!(tracker.has_doses("amoxicillin"));

        let occasional = med(0, "08:00:00");
        tracker
            .initialize_todays_schedule(&occasional, at("07:00:00"))
            .unwrap();
        assert!(!tracker.has_doses("amoxicillin"));
    }

    #[test]
    fn tracker_is_shareable_across_threads() {
        let tracker = Arc::new(DoseTracker::new());
        tracker
            .initialize_todays_schedule(&med(2, "08:00:00"), at("07:00:00"))
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let _ = tracker.dose_states("amoxicillin", at("08:05:00"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.dose_states("amoxicillin", at("08:05:00")).len(), 2);
    }
}
