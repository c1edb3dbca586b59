//! OS wake-alarm scheduling against a capped timer service.
//!
//! The host platform allows at most 500 concurrently-armed alarms
//! system-wide, so each medication only arms a 7-day lookahead window per
//! slot (yellow alert 10 minutes ahead, red alert at the slot). When a
//! red-alert timer for the last armed day fires, the external alarm-fired
//! handler re-invokes [`arm_alarms`] to slide the window one day forward;
//! the core never tracks elapsed days itself.
//!
//! Alarm identities are derived, never stored:
//! `fnv1a32(medication_id) + slot_index·10_000 + day_offset·100`, plus 1 for
//! the yellow alert. FNV-1a is fixed here so cancellation can recompute the
//! exact identities without enumerating armed timers. Identities are u64 to
//! keep the additive terms out of the hash's value range; a residual
//! cross-medication collision can at worst cancel a sibling's alarm, which
//! the next arm pass re-arms.

use crate::schedule::daily_slots;
use crate::{AlertKind, Error, Medication, Result};
use chrono::{Duration, NaiveDateTime};

/// Documented platform-wide ceiling on concurrently-armed alarms
pub const PLATFORM_ALARM_CEILING: u32 = 500;
/// Days of alarms pre-armed per (medication, slot)
pub const LOOKAHEAD_DAYS: u32 = 7;
/// Day offsets swept on cancellation; wider than the lookahead to be safe
/// against windows that drifted forward since arming
pub const CANCEL_SWEEP_DAYS: u32 = 31;

/// Stable, reproducible identity of one armed alarm
pub type AlarmId = u64;

/// Failure modes of the timer collaborator
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    /// The platform rejected the alarm because the ceiling was hit.
    /// Non-fatal: already-armed timers remain valid.
    #[error("concurrent alarm limit reached")]
    LimitReached,

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// The OS alarm primitive, consumed as a narrow interface.
///
/// When an armed alarm elapses the platform calls back with
/// `(medication_id, slot, alert kind)`; handling that callback (showing a
/// notification, sliding the lookahead window) lives outside this crate.
pub trait TimerService {
    fn schedule(&mut self, identity: AlarmId, at: NaiveDateTime)
        -> std::result::Result<(), TimerError>;
    /// Cancelling an identity that was never armed is a no-op
    fn cancel(&mut self, identity: AlarmId);
}

/// 32-bit FNV-1a over the medication id
fn fnv1a32(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Derive the identity of one alarm. Deterministic, so cancellation
/// recomputes the same values without any bookkeeping.
pub fn alarm_identity(
    medication_id: &str,
    slot_index: u32,
    day_offset: u32,
    kind: AlertKind,
) -> AlarmId {
    let base = fnv1a32(medication_id.as_bytes()) as u64
        + slot_index as u64 * 10_000
        + day_offset as u64 * 100;
    match kind {
        AlertKind::Yellow => base + 1,
        AlertKind::Red => base,
    }
}

/// What an arm pass accomplished
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArmOutcome {
    /// Alarms actually armed
    pub armed: u32,
    /// True when the platform ceiling cut the pass short
    pub truncated: bool,
}

/// Arm the yellow/red alarms for every slot of a medication over the
/// lookahead window.
///
/// Slots already past today roll to their next occurrence. The window is
/// clamped to the remaining treatment days; chronic medications always get
/// the full lookahead. Hitting the platform ceiling stops the pass for this
/// medication with a warning and is reported as truncation, not an error.
pub fn arm_alarms<T: TimerService>(
    service: &mut T,
    med: &Medication,
    now: NaiveDateTime,
) -> Result<ArmOutcome> {
    if !med.active || med.paused || !med.has_schedule() {
        tracing::debug!("Medication '{}' needs no alarms", med.id);
        return Ok(ArmOutcome::default());
    }

    let slots = daily_slots(med)?;

    // Re-arming must not stack on top of a previous window
    cancel_alarms(service, med);

    let days_to_arm = match med.remaining_treatment_days(now.date()) {
        None => LOOKAHEAD_DAYS,
        Some(remaining) => remaining.min(LOOKAHEAD_DAYS),
    };
    if days_to_arm == 0 {
        tracing::debug!("No treatment days left for '{}', nothing to arm", med.id);
        return Ok(ArmOutcome::default());
    }

    let mut outcome = ArmOutcome::default();
    for (slot_index, slot) in slots.iter().enumerate() {
        let mut base = now.date().and_time(*slot);
        if base <= now {
            base += Duration::days(1);
        }

        for day_offset in 0..days_to_arm {
            let red_at = base + Duration::days(day_offset as i64);
            let yellow_at = red_at - Duration::minutes(crate::dose::YELLOW_ALERT_LEAD_MINUTES);

            if yellow_at > now {
                let id = alarm_identity(&med.id, slot_index as u32, day_offset, AlertKind::Yellow);
                match service.schedule(id, yellow_at) {
                    Ok(()) => outcome.armed += 1,
                    Err(TimerError::LimitReached) => {
                        tracing::warn!(
                            "Alarm ceiling ({}) reached arming '{}'; stopping after {} alarm(s)",
                            PLATFORM_ALARM_CEILING,
                            med.id,
                            outcome.armed
                        );
                        outcome.truncated = true;
                        return Ok(outcome);
                    }
                    Err(TimerError::Backend(e)) => return Err(Error::Timer(e)),
                }
            }

            let id = alarm_identity(&med.id, slot_index as u32, day_offset, AlertKind::Red);
            match service.schedule(id, red_at) {
                Ok(()) => outcome.armed += 1,
                Err(TimerError::LimitReached) => {
                    tracing::warn!(
                        "Alarm ceiling ({}) reached arming '{}'; stopping after {} alarm(s)",
                        PLATFORM_ALARM_CEILING,
                        med.id,
                        outcome.armed
                    );
                    outcome.truncated = true;
                    return Ok(outcome);
                }
                Err(TimerError::Backend(e)) => return Err(Error::Timer(e)),
            }
        }
    }

    tracing::info!(
        "Armed {} alarm(s) for '{}' over {} day(s)",
        outcome.armed,
        med.id,
        days_to_arm
    );
    Ok(outcome)
}

/// Cancel every alarm this medication could have armed.
///
/// Identities are re-derived over the full cancel sweep range regardless of
/// what was actually armed; cancelling an unarmed identity is a no-op by
/// contract.
pub fn cancel_alarms<T: TimerService>(service: &mut T, med: &Medication) {
    for slot_index in 0..med.daily_dose_count {
        for day_offset in 0..=CANCEL_SWEEP_DAYS {
            service.cancel(alarm_identity(&med.id, slot_index, day_offset, AlertKind::Yellow));
            service.cancel(alarm_identity(&med.id, slot_index, day_offset, AlertKind::Red));
        }
    }
    tracing::debug!("Cancelled alarm identities for '{}'", med.id);
}
