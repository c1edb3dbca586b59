//! Error types for the dosier_core library.

use chrono::NaiveDateTime;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dosier_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error (e.g. a scheduled medication without a
    /// first-dose time)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dose action was rejected; recoverable, never a fault
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Timer service failure other than the alarm ceiling
    #[error("Timer service error: {0}")]
    Timer(String),

    /// Medication roster / record store error
    #[error("Store error: {0}")]
    Store(String),
}

/// Typed rejection for mark-taken and postpone operations.
///
/// These are returned to the caller as values so the UI can pick the right
/// user-facing message; none of them aborts anything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no scheduled dose found for this medication and slot")]
    DoseNotFound,

    #[error("this dose was already marked as taken")]
    AlreadyTaken,

    #[error("this dose was already omitted and can no longer be taken")]
    AlreadyOmitted,

    #[error("too early: the dose is scheduled for {scheduled} and can be taken from 10 minutes before")]
    TooEarly { scheduled: NaiveDateTime },

    #[error("more than the allowed window has passed; this dose is considered omitted")]
    WindowExpired,

    #[error("maximum postponements reached; the dose is considered omitted")]
    MaxPostponements,
}
