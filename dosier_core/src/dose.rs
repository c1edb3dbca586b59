//! Dose status state machine and postponement policy.
//!
//! Status is never driven by timers: it is recomputed from the wall clock on
//! every read, and a recompute only moves forward along
//! `Pending → YellowAlert → RedAlert → Delayed → Omitted`. `Taken` is a side
//! exit from any non-terminal status. Each status stamps the instant it was
//! first observed, at most once.

use crate::{DoseStatus, ScheduledDose, ValidationError};
use chrono::{Duration, NaiveDateTime};

/// Minutes before the scheduled time at which the yellow alert opens
pub const YELLOW_ALERT_LEAD_MINUTES: i64 = 10;
/// Minutes after the scheduled time at which a red alert becomes a delay
pub const DELAYED_AFTER_MINUTES: i64 = 10;
/// Minutes after the scheduled time at which an untaken dose is omitted
pub const OMITTED_AFTER_MINUTES: i64 = 60;
/// Minutes each postponement pushes the dose
pub const POSTPONE_STEP_MINUTES: i64 = 10;
/// Hard cap on postponements per dose
pub const MAX_POSTPONEMENTS: u8 = 3;

impl ScheduledDose {
    /// Instant the yellow-alert window opens (also the earliest valid
    /// mark-taken time)
    pub fn yellow_alert_from(&self) -> NaiveDateTime {
        self.scheduled_at - Duration::minutes(YELLOW_ALERT_LEAD_MINUTES)
    }

    /// Instant the dose counts as delayed rather than merely late
    pub fn delayed_from(&self) -> NaiveDateTime {
        self.scheduled_at + Duration::minutes(DELAYED_AFTER_MINUTES)
    }

    /// Instant past which the dose is omitted and can no longer be taken.
    ///
    /// Every postponement already moved `scheduled_at` forward 10 minutes
    /// and additionally stretches this window by 10 more.
    pub fn omitted_deadline(&self) -> NaiveDateTime {
        self.scheduled_at
            + Duration::minutes(OMITTED_AFTER_MINUTES)
            + Duration::minutes(self.postponements as i64 * POSTPONE_STEP_MINUTES)
    }

    /// Pure window lookup: which time-driven status corresponds to `now`.
    /// Never returns `Taken`.
    pub fn status_for(&self, now: NaiveDateTime) -> DoseStatus {
        if now < self.yellow_alert_from() {
            DoseStatus::Pending
        } else if now < self.scheduled_at {
            DoseStatus::YellowAlert
        } else if now < self.delayed_from() {
            DoseStatus::RedAlert
        } else if now < self.omitted_deadline() {
            DoseStatus::Delayed
        } else {
            DoseStatus::Omitted
        }
    }

    /// Advance the stored status to match `now`.
    ///
    /// Idempotent and forward-only: a recompute never regresses a status,
    /// and a terminal dose is left untouched. The first entry into a status
    /// stamps its timestamp.
    pub fn advance(&mut self, now: NaiveDateTime) {
        if self.status.is_terminal() {
            return;
        }

        let target = self.status_for(now);
        if target.rank() <= self.status.rank() {
            return;
        }

        self.status = target;
        let stamp = match target {
            DoseStatus::YellowAlert => &mut self.yellow_alert_at,
            DoseStatus::RedAlert => &mut self.red_alert_at,
            DoseStatus::Delayed => &mut self.delayed_at,
            DoseStatus::Omitted => &mut self.omitted_at,
            DoseStatus::Pending | DoseStatus::Taken => return,
        };
        if stamp.is_none() {
            *stamp = Some(now);
        }
    }

    /// Force the dose into `Omitted` (missed window, failed fourth
    /// postponement, day-boundary sweep). No-op on terminal doses.
    pub fn force_omit(&mut self, now: NaiveDateTime) {
        if self.status.is_terminal() {
            return;
        }
        self.status = DoseStatus::Omitted;
        if self.omitted_at.is_none() {
            self.omitted_at = Some(now);
        }
    }

    /// Mark the dose as taken, validating the take window first.
    ///
    /// Rejections, in order: already taken, already omitted, too early
    /// (before the yellow-alert window opens), window expired (at or past
    /// the omitted deadline, which also forces the dose to `Omitted`).
    pub fn mark_taken(&mut self, now: NaiveDateTime) -> Result<(), ValidationError> {
        if self.taken {
            return Err(ValidationError::AlreadyTaken);
        }
        if self.status == DoseStatus::Omitted {
            return Err(ValidationError::AlreadyOmitted);
        }
        if now < self.yellow_alert_from() {
            return Err(ValidationError::TooEarly {
                scheduled: self.scheduled_at,
            });
        }
        if now >= self.omitted_deadline() {
            self.force_omit(now);
            return Err(ValidationError::WindowExpired);
        }

        self.status = DoseStatus::Taken;
        self.taken = true;
        Ok(())
    }

    /// Postpone the dose 10 minutes, up to 3 times.
    ///
    /// On success returns how many postponements remain; the status resets
    /// to `Pending` while the historical transition timestamps stay as a
    /// record of the original pass. A fourth attempt forces the dose to
    /// `Omitted` instead of rescheduling it.
    pub fn postpone(&mut self, now: NaiveDateTime) -> Result<u8, ValidationError> {
        if self.taken {
            return Err(ValidationError::AlreadyTaken);
        }
        if self.status == DoseStatus::Omitted {
            return Err(ValidationError::AlreadyOmitted);
        }
        if self.postponements >= MAX_POSTPONEMENTS {
            self.force_omit(now);
            return Err(ValidationError::MaxPostponements);
        }

        self.scheduled_at += Duration::minutes(POSTPONE_STEP_MINUTES);
        self.postponements += 1;
        self.status = DoseStatus::Pending;
        Ok(MAX_POSTPONEMENTS - self.postponements)
    }

    /// Whether the dose can be acted on right now: inside
    /// `[scheduled − 10 min, omitted deadline)` and not terminal
    pub fn in_take_window(&self, now: NaiveDateTime) -> bool {
        !self.taken
            && self.status != DoseStatus::Omitted
            && now >= self.yellow_alert_from()
            && now < self.omitted_deadline()
    }

    /// Whether the dose still matters for the urgent view: not terminal and
    /// either upcoming or past but inside its omitted window
    pub fn is_actionable(&self, now: NaiveDateTime) -> bool {
        !self.taken
            && self.status != DoseStatus::Omitted
            && (self.scheduled_at > now || now < self.omitted_deadline())
    }
}
