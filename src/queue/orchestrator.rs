//! QueueOrchestrator — one full recomputation of the waiting queue.
//!
//! Validate → Score → Sort → Estimate → Allocate → Annotate.
//! Holds no state between calls; output depends only on the inputs and `now`.

use chrono::{DateTime, Utc};

use super::allocator::{requires_nurse, ResourceAllocator};
use super::error::QueueError;
use super::estimator::WaitTimeEstimator;
use super::features::{extract_features, FeatureVector};
use super::priority::{compare_priority, PriorityScorer};
use super::types::*;
use super::validation::{partition_valid, validate_facility};
use crate::config::QueueConfig;
use crate::models::{FacilityState, Patient};

/// A validated patient with its ranking inputs.
#[derive(Debug, Clone)]
struct Ranked<'a> {
    patient: &'a Patient,
    score: f64,
    current_wait_minutes: f64,
    features: FeatureVector,
}

pub struct QueueOrchestrator {
    scorer: PriorityScorer,
    estimator: WaitTimeEstimator,
    allocator: ResourceAllocator,
}

impl QueueOrchestrator {
    pub fn new(config: &QueueConfig, estimator: WaitTimeEstimator) -> Self {
        tracing::debug!(
            model_backed = estimator.has_primary(),
            max_in_flight = config.max_concurrent_predictions,
            nurse_policy = ?config.nurse_policy,
            "Queue orchestrator ready"
        );
        Self {
            scorer: PriorityScorer::new(config.weights.clone()),
            estimator: estimator.with_max_in_flight(config.max_concurrent_predictions),
            allocator: ResourceAllocator::new(config.nurse_policy),
        }
    }

    /// Recompute the queue, one prediction at a time. Each prediction is
    /// bounded by the estimator timeout.
    pub fn refresh(
        &self,
        patients: &[Patient],
        facility: &FacilityState,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, QueueError> {
        validate_facility(facility).map_err(QueueError::InvalidFacility)?;

        let (ranked, rejected) = self.rank(patients, facility, now);
        let estimates: Vec<WaitEstimate> = prediction_requests(&ranked, facility)
            .iter()
            .map(|request| self.estimator.estimate(request))
            .collect();

        Ok(self.assemble(ranked, estimates, facility, rejected, now))
    }

    /// Recompute the queue with predictions fanned out to the blocking pool,
    /// each bounded by the estimator timeout. Same output as `refresh` for
    /// predictors that finish in time.
    pub async fn refresh_concurrent(
        &self,
        patients: &[Patient],
        facility: &FacilityState,
        now: DateTime<Utc>,
    ) -> Result<RefreshOutcome, QueueError> {
        validate_facility(facility).map_err(QueueError::InvalidFacility)?;

        let (ranked, rejected) = self.rank(patients, facility, now);
        let requests = prediction_requests(&ranked, facility);
        let estimates = self.estimator.estimate_all(requests).await;

        Ok(self.assemble(ranked, estimates, facility, rejected, now))
    }

    fn rank<'a>(
        &self,
        patients: &'a [Patient],
        facility: &FacilityState,
        now: DateTime<Utc>,
    ) -> (Vec<Ranked<'a>>, Vec<RejectedRecord>) {
        let (valid, rejected) = partition_valid(patients, now);

        let mut ranked: Vec<Ranked<'a>> = valid
            .into_iter()
            .map(|patient| {
                let current_wait_minutes = patient.factors.minutes_waited(now);
                Ranked {
                    patient,
                    score: self.scorer.score(&patient.factors, current_wait_minutes),
                    current_wait_minutes,
                    features: extract_features(&patient.factors, facility),
                }
            })
            .collect();

        ranked.sort_by(|a, b| compare_priority((a.patient, a.score), (b.patient, b.score)));
        (ranked, rejected)
    }

    fn assemble(
        &self,
        ranked: Vec<Ranked<'_>>,
        estimates: Vec<WaitEstimate>,
        facility: &FacilityState,
        rejected: Vec<RejectedRecord>,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let ordered: Vec<&Patient> = ranked.iter().map(|r| r.patient).collect();
        let mut allocations = self.allocator.allocate(&ordered, facility);

        let entries: Vec<QueueEntry> = ranked
            .into_iter()
            .zip(estimates)
            .enumerate()
            .map(|(position, (r, estimate))| QueueEntry {
                patient_id: r.patient.id.clone(),
                position,
                priority_score: r.score,
                current_wait_minutes: r.current_wait_minutes,
                predicted_wait_time: estimate.minutes,
                predicted_wait_display: estimate.display_minutes(),
                estimate_source: estimate.source,
                requires_nurse: requires_nurse(&r.patient.factors),
                allocation: allocations.remove(&r.patient.id),
            })
            .collect();

        let summary = QueueSummary::from_entries(&entries, rejected.len());
        tracing::info!(
            queued = summary.queued,
            allocated = summary.allocated,
            fallback = summary.fallback_estimates,
            rejected = summary.rejected,
            "Queue refreshed"
        );

        RefreshOutcome {
            generated_at: now,
            entries,
            rejected,
            summary,
        }
    }
}

fn prediction_requests(ranked: &[Ranked<'_>], facility: &FacilityState) -> Vec<PredictionRequest> {
    ranked
        .iter()
        .enumerate()
        .map(|(position, r)| PredictionRequest {
            patient_id: r.patient.id.clone(),
            features: r.features,
            urgency_level: r.patient.factors.urgency_level,
            estimated_procedure_time: r.patient.factors.estimated_procedure_time,
            average_processing_time: facility.average_processing_time,
            queue_position: position,
        })
        .collect()
}
