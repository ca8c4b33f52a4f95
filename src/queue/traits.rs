//! Trait definitions for the queue engine seams.
//!
//! - WaitTimePredictor: pluggable wait-time strategy (model-backed or fallback)
//! - PatientSource / FacilitySource: where the current inputs come from
//! - QueueSink: fire-and-forget write-back of refresh results

use std::sync::Arc;

use super::error::{EstimationError, QueueError, SinkError};
use super::types::{PatientBatch, PredictionRequest, QueueEntry};
use crate::models::FacilityState;

/// Predicts minutes until a waiting patient begins treatment.
pub trait WaitTimePredictor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Predict a wait in minutes. Implementations may fail; callers fall back.
    fn predict(&self, request: &PredictionRequest) -> Result<f64, EstimationError>;
}

/// Supplies the current patient set (all statuses).
pub trait PatientSource: Send + Sync {
    fn load_patients(&self) -> Result<PatientBatch, QueueError>;
}

/// Supplies the current facility configuration.
pub trait FacilitySource: Send + Sync {
    fn load_facility(&self) -> Result<FacilityState, QueueError>;
}

/// Persists priority score, predicted wait and assigned resources.
pub trait QueueSink: Send + Sync {
    fn write_back(&self, entries: &[QueueEntry]) -> Result<(), SinkError>;
}

impl<T: QueueSink + ?Sized> QueueSink for Arc<T> {
    fn write_back(&self, entries: &[QueueEntry]) -> Result<(), SinkError> {
        (**self).write_back(entries)
    }
}
