//! Injectable wall-clock source.
//!
//! Every status transition in this crate is derived from local wall-clock
//! time, so the clock is a trait rather than direct `Local::now()` calls.
//! Production code uses [`SystemClock`]; tests drive [`ManualClock`].

use chrono::{Local, NaiveDateTime};

/// Source of "now" in local wall-clock time
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Real clock backed by the OS local time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for deterministic tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    /// Move the clock to a new instant
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
