//! Daily dose schedule derivation.
//!
//! A medication with `daily_dose_count = N > 0` takes its doses at N slots
//! spread across the day starting at the first-dose time:
//! `slot[i] = first + i * (24 / N) hours`, hours wrapped modulo 24 using
//! integer division. Only the first slot keeps the configured minute; later
//! slots land on the hour. This mirrors how treatment plans are written
//! ("every 8 hours starting at 07:30") rather than a generalized rounding
//! scheme.

use crate::{Error, Medication, Result, ScheduledDose};
use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// A first-dose time of exactly 00:00 doubles as the roster's "no schedule
/// configured" marker
pub fn is_no_schedule_sentinel(t: NaiveTime) -> bool {
    t.hour() == 0 && t.minute() == 0
}

/// Derive the ordered daily slot list for a medication.
///
/// `daily_dose_count = 0` yields no slots (occasional medication, handled by
/// a one-off take action). A missing first-dose time on a scheduled
/// medication is a configuration error, not a silent default.
pub fn daily_slots(med: &Medication) -> Result<Vec<NaiveTime>> {
    if med.daily_dose_count == 0 {
        return Ok(Vec::new());
    }
    if med.daily_dose_count > 24 {
        return Err(Error::Config(format!(
            "medication '{}' has {} daily doses; at most 24 are supported",
            med.id, med.daily_dose_count
        )));
    }

    let first = med.first_dose_time.ok_or_else(|| {
        Error::Config(format!(
            "medication '{}' has {} daily doses but no first-dose time",
            med.id, med.daily_dose_count
        ))
    })?;

    let interval = 24 / med.daily_dose_count;
    let mut slots = Vec::with_capacity(med.daily_dose_count as usize);
    for i in 0..med.daily_dose_count {
        let hour = (first.hour() + i * interval) % 24;
        let minute = if i == 0 { first.minute() } else { 0 };
        // hour < 24 and minute < 60 by construction
        let slot = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| Error::Config(format!("invalid derived slot {hour:02}:{minute:02}")))?;
        slots.push(slot);
    }

    Ok(slots)
}

/// Materialize today's dose instances for a medication, merging with what
/// already exists.
///
/// The freshly derived slot set is diffed against `existing` keyed by slot:
/// a live instance already bound to today keeps its state (postponements and
/// the taken flag survive re-initialization), missing slots get a fresh
/// `Pending` instance, and anything not belonging to today is dropped.
/// Calling this twice without external mutation yields identical instances.
pub fn materialize_today(
    med: &Medication,
    existing: &[ScheduledDose],
    now: NaiveDateTime,
) -> Result<Vec<ScheduledDose>> {
    let today = now.date();
    let slots = daily_slots(med)?;

    let mut doses = Vec::with_capacity(slots.len());
    for slot in slots {
        let live = existing
            .iter()
            .find(|d| d.slot == slot && d.scheduled_at.date() == today);
        match live {
            Some(dose) => doses.push(dose.clone()),
            None => doses.push(ScheduledDose::new(med.id.clone(), slot, today.and_time(slot))),
        }
    }

    tracing::debug!(
        "Materialized {} dose(s) for medication '{}' on {}",
        doses.len(),
        med.id,
        today
    );

    Ok(doses)
}
