#![forbid(unsafe_code)]

//! Core domain model and business logic for the Dosier medication tracker.
//!
//! This crate provides:
//! - Domain types (medications, scheduled doses, dose records)
//! - Daily schedule derivation and merge
//! - The time-driven dose status state machine and postponement policy
//! - Dashboard visibility filtering
//! - Wake-alarm scheduling against a capped timer service
//! - Persistence (dose log, CSV archive, roster, config)

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod dose;
pub mod tracker;
pub mod dashboard;
pub mod alarms;
pub mod log;
pub mod csv_rollup;
pub mod history;
pub mod stock;
pub mod store;
pub mod actions;

// Re-export commonly used types
pub use error::{Error, Result, ValidationError};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use tracker::DoseTracker;
pub use dashboard::visible_medications;
pub use alarms::{alarm_identity, arm_alarms, cancel_alarms, AlarmId, ArmOutcome, TimerError, TimerService};
pub use log::{read_records, DoseRecordSink, JsonlSink};
pub use history::{adherence, load_recent_records, AdherenceSummary};
pub use store::{FileStore, Persistence};
pub use actions::{record_omitted_dose, record_taken_dose, TakeOutcome};
pub use stock::{check_stock, consume_dose, stock_level, StockAlert, StockLevel};
