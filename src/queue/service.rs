//! QueueService — wires sources, orchestrator and sink for one update cycle.
//!
//! Called on every mutating queue event (patient added/removed/status change,
//! facility config change) and by the periodic refresher. Each run is a
//! fresh recomputation; a newer run simply supersedes an older one.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::error::QueueError;
use super::orchestrator::QueueOrchestrator;
use super::traits::{FacilitySource, PatientSource, QueueSink};
use super::types::{PatientBatch, RefreshOutcome, RejectedRecord};
use crate::config::InclusionPolicy;
use crate::models::{FacilityState, Patient, PatientStatus};

/// Outcome of one service run, with bookkeeping the pure outcome omits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub refresh_id: String,
    pub duration_ms: u64,
    /// Patients skipped by the inclusion policy.
    pub excluded: u32,
    pub written_back: bool,
    pub outcome: RefreshOutcome,
}

pub struct QueueService {
    patients: Box<dyn PatientSource>,
    facility: Box<dyn FacilitySource>,
    sink: Option<Box<dyn QueueSink>>,
    orchestrator: QueueOrchestrator,
    inclusion: InclusionPolicy,
}

impl QueueService {
    pub fn new(
        patients: Box<dyn PatientSource>,
        facility: Box<dyn FacilitySource>,
        orchestrator: QueueOrchestrator,
        inclusion: InclusionPolicy,
    ) -> Self {
        Self {
            patients,
            facility,
            sink: None,
            orchestrator,
            inclusion,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn QueueSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Load, refresh on the calling thread, write back.
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<RefreshReport, QueueError> {
        let start = Instant::now();
        let (batch, facility) = self.load()?;
        let (included, excluded) = self.include(batch.patients);

        let outcome = self.orchestrator.refresh(&included, &facility, now)?;
        Ok(self.finish(outcome, batch.rejected, excluded, start))
    }

    /// Load, refresh with concurrent bounded predictions, write back.
    pub async fn run_once_concurrent(
        &self,
        now: DateTime<Utc>,
    ) -> Result<RefreshReport, QueueError> {
        let start = Instant::now();
        let (batch, facility) = self.load()?;
        let (included, excluded) = self.include(batch.patients);

        let outcome = self
            .orchestrator
            .refresh_concurrent(&included, &facility, now)
            .await?;
        Ok(self.finish(outcome, batch.rejected, excluded, start))
    }

    /// Patients first: file-backed sources stage the facility from that read.
    fn load(&self) -> Result<(PatientBatch, FacilityState), QueueError> {
        let batch = self.patients.load_patients()?;
        let facility = self.facility.load_facility()?;
        Ok((batch, facility))
    }

    fn include(&self, patients: Vec<Patient>) -> (Vec<Patient>, u32) {
        let total = patients.len();
        let included: Vec<Patient> = patients
            .into_iter()
            .filter(|p| match p.status {
                PatientStatus::Waiting => true,
                PatientStatus::InProgress => {
                    self.inclusion == InclusionPolicy::WaitingAndInProgress
                }
                PatientStatus::Completed | PatientStatus::Cancelled => false,
            })
            .collect();
        let excluded = (total - included.len()) as u32;
        (included, excluded)
    }

    fn finish(
        &self,
        mut outcome: RefreshOutcome,
        source_rejections: Vec<RejectedRecord>,
        excluded: u32,
        start: Instant,
    ) -> RefreshReport {
        if !source_rejections.is_empty() {
            outcome.summary.rejected += source_rejections.len() as u32;
            let mut rejected = source_rejections;
            rejected.append(&mut outcome.rejected);
            outcome.rejected = rejected;
        }

        let written_back = match &self.sink {
            Some(sink) => match sink.write_back(&outcome.entries) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "Queue write-back failed");
                    false
                }
            },
            None => false,
        };

        let report = RefreshReport {
            refresh_id: Uuid::new_v4().to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            excluded,
            written_back,
            outcome,
        };

        tracing::debug!(
            refresh_id = %report.refresh_id,
            duration_ms = report.duration_ms,
            excluded,
            written_back,
            "Queue service run finished"
        );

        report
    }
}
