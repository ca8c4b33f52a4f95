//! Error types for the queue engine.
//!
//! Only `QueueError` fails a refresh. Validation errors become per-record
//! rejections. Estimation errors become fallback estimates. Sink errors are
//! logged.

use thiserror::Error;

/// A single patient or facility record failed validation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Record has no id")]
    MissingId,

    #[error("Duplicate patient id: {0}")]
    DuplicateId(String),

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Urgency level {0} outside 1-5")]
    UrgencyOutOfRange(u8),

    #[error("Arrival time is {minutes_ahead:.1} minutes in the future")]
    ArrivalInFuture { minutes_ahead: f64 },

    #[error("Estimated procedure time must be positive, got {0}")]
    NonPositiveProcedureTime(f64),

    #[error("Previous wait history must be non-negative, got {0}")]
    NegativeWaitHistory(f64),

    #[error("Average processing time must be positive, got {0}")]
    NonPositiveProcessingTime(f64),

    #[error("Department load for {department} outside [0, 1]: {value}")]
    LoadOutOfRange { department: String, value: f64 },

    #[error("Invalid {field} value: {value}")]
    InvalidEnum { field: String, value: String },
}

/// A wait-time predictor could not produce a usable estimate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Predictor unavailable: {0}")]
    Unavailable(String),

    #[error("Prediction timed out after {0} ms")]
    Timeout(u64),

    #[error("Predictor panicked")]
    Panicked,

    #[error("Predictor returned a non-finite value")]
    NonFinite,

    #[error("Predictor returned a negative wait: {0}")]
    Negative(f64),

    #[error("Prediction failed: {0}")]
    Failed(String),
}

/// Write-back of refresh results failed.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Invalid facility state: {0}")]
    InvalidFacility(ValidationError),

    #[error("Patient source error: {0}")]
    Source(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
