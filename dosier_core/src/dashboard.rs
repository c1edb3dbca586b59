//! Urgent/home view filtering.
//!
//! Decides which medications deserve the user's attention right now, based
//! on their current dose states. The rules follow the dose windows in
//! `dose.rs`, with one special case: in the 00:01–01:00 window a medication
//! only surfaces for a still-actionable midnight dose, never for stale
//! same-day state.

use crate::schedule::is_no_schedule_sentinel;
use crate::{DoseTracker, Medication};
use chrono::{NaiveDateTime, Timelike};

/// Whether `now` falls in the midnight grace window (00:01–01:00 inclusive)
fn in_midnight_window(now: NaiveDateTime) -> bool {
    let minutes = now.time().hour() * 60 + now.time().minute();
    (1..=60).contains(&minutes)
}

/// Filter the full medication list down to the ones the urgent view shows.
///
/// A medication is included iff it is active, has a fixed schedule with a
/// real first-dose time, has not completed all of today's doses, and still
/// has at least one actionable dose (upcoming, or past but inside its
/// omitted window). A medication whose doses were not materialized yet is
/// always included; filtering is deferred until the generator runs.
pub fn visible_medications<'a>(
    medications: &'a [Medication],
    tracker: &DoseTracker,
    now: NaiveDateTime,
) -> Vec<&'a Medication> {
    let mut visible = Vec::new();

    for med in medications {
        if !med.active || !med.has_schedule() {
            continue;
        }
        let first = match med.first_dose_time {
            Some(t) if !is_no_schedule_sentinel(t) => t,
            _ => continue,
        };

        // Newly created medication: nothing materialized yet, show it and
        // let the next scheduling pass decide
        if !tracker.has_doses(&med.id) {
            tracing::debug!(
                "Medication '{}' has no doses yet, showing on dashboard",
                med.id
            );
            visible.push(med);
            continue;
        }

        if tracker.all_taken_today(&med.id) {
            tracing::debug!("Medication '{}' fully satisfied for today", med.id);
            continue;
        }

        let include = if in_midnight_window(now) {
            tracker.has_actionable_midnight_dose(&med.id, now)
        } else {
            tracker
                .dose_states(&med.id, now)
                .iter()
                .any(|d| d.scheduled_at.date() == now.date() && d.is_actionable(now))
        };

        if include {
            visible.push(med);
        } else {
            tracing::debug!(
                "Medication '{}' (first dose {}) has no actionable dose at {}",
                med.id,
                first,
                now
            );
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn med(id: &str, count: u32, first: Option<&str>) -> Medication {
        Medication {
            id: id.into(),
            name: id.into(),
            daily_dose_count: count,
            first_dose_time: first.map(|s| s.parse().unwrap()),
            treatment_days: None,
            treatment_started_on: None,
            active: true,
            paused: false,
            current_stock: 30,
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
    fn inactive_and_unscheduled_medications_are_hidden() {
        let tracker = DoseTracker::new();
        let mut inactive = med("a", 2, Some("08:00:00"));
        inactive.active = false;
        let occasional = med("b", 0, None);
        let no_time = med("c", 2, None);
        let sentinel = med("d", 2, Some("00:00:00"));

        let meds = vec![inactive, occasional, no_time, sentinel];
        assert!(visible_medications(&meds, &tracker, at("10:00:00")).is_empty());
    }

    #[test]
    fn new_medication_without_doses_is_shown() {
        let tracker = DoseTracker::new();
        let meds = vec![med("a", 2, Some("08:00:00"))];
        let visible = visible_medications(&meds, &tracker, at("10:00:00"));
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn fully_taken_medication_is_hidden() {
        let tracker = DoseTracker::new();
        let m = med("a", 1, Some("08:00:00"));
        tracker.initialize_todays_schedule(&m, at("07:00:00")).unwrap();
        tracker
            .mark_taken("a", slot("08:00:00"), at("08:00:00"))
            .unwrap();

        let meds = vec![m];
        assert!(visible_medications(&meds, &tracker, at("09:00:00")).is_empty());
    }

    #[test]
    fn upcoming_dose_keeps_medication_visible() {
        let tracker = DoseTracker::new();
        let m = med("a", 2, Some("08:00:00"));
        tracker.initialize_todays_schedule(&m, at("07:00:00")).unwrap();

        let meds = vec![m];
        assert_eq!(visible_medications(&meds, &tracker, at("15:00:00")).len(), 1);
    }

    #[test]
    fn past_dose_inside_window_keeps_medication_visible() {
        let tracker = DoseTracker::new();
        let m = med("a", 1, Some("08:00:00"));
        tracker.initialize_todays_schedule(&m, at("07:00:00")).unwrap();

        let meds = vec![m];
        // 08:45 is past the dose but before the 09:00 deadline
        assert_eq!(visible_medications(&meds, &tracker, at("08:45:00")).len(), 1);
    }

    #[test]
    fn medication_with_only_expired_doses_is_hidden() {
        let tracker = DoseTracker::new();
        let m = med("a", 1, Some("08:00:00"));
        tracker.initialize_todays_schedule(&m, at("07:00:00")).unwrap();

        let meds = vec![m];
        assert!(visible_medications(&meds, &tracker, at("10:00:00")).is_empty());
    }

    #[test]
    fn midnight_window_requires_actionable_midnight_dose() {
        let tracker = DoseTracker::new();
        // 12:00 first dose with 2/day puts the second slot at 00:00
        let m = med("a", 2, Some("12:00:00"));
        tracker.initialize_todays_schedule(&m, at("00:05:00")).unwrap();

        let meds = vec![m];
        assert_eq!(visible_medications(&meds, &tracker, at("00:30:00")).len(), 1);
        // Past the midnight dose's 01:00 deadline nothing is actionable
        assert!(visible_medications(&meds, &tracker, at("01:00:00")).is_empty());
    }

    #[test]
    fn midnight_window_hides_medications_without_midnight_dose() {
        let tracker = DoseTracker::new();
        let m = med("a", 1, Some("09:00:00"));
        tracker.initialize_todays_schedule(&m, at("00:05:00")).unwrap();

        // A 09:00 dose is upcoming, but between 00:01 and 01:00 only
        // midnight doses count
        let meds = vec![m.clone()];
        assert!(visible_medications(&meds, &tracker, at("00:30:00")).is_empty());
        // Immediately after the window the normal rules apply again
        assert_eq!(visible_medications(&meds, &tracker, at("01:01:00")).len(), 1);
    }
}
