//! Priority scoring: deterministic weighted sum, higher = served sooner.
//!
//! The wait term is logarithmic. Long-waiting low-urgency patients climb, but
//! for realistic waits they do not overtake a large urgency gap.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Patient, PatientFactors};

/// Policy weights for the priority formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityWeights {
    pub urgency: f64,
    pub appointment_type: f64,
    pub age_group: f64,
    pub special_needs: f64,
    pub wait_log: f64,
    pub punctuality: f64,
    /// Minutes late that still count as on time.
    pub on_time_grace_minutes: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgency: 10.0,
            appointment_type: 5.0,
            age_group: 3.0,
            special_needs: 5.0,
            wait_log: 3.0,
            punctuality: 5.0,
            on_time_grace_minutes: 15.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriorityScorer {
    weights: PriorityWeights,
}

impl PriorityScorer {
    pub fn new(weights: PriorityWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &PriorityWeights {
        &self.weights
    }

    /// Score one patient given minutes already waited.
    pub fn score(&self, patient: &PatientFactors, current_wait_minutes: f64) -> f64 {
        let w = &self.weights;
        let wait = current_wait_minutes.max(0.0);

        let mut score = f64::from(patient.urgency_level) * w.urgency
            + patient.appointment_type.weight() * w.appointment_type
            + patient.age_group.weight() * w.age_group
            + (wait + 1.0).ln() * w.wait_log;

        if patient.special_needs {
            score += w.special_needs;
        }
        if self.arrived_early_or_on_time(patient) {
            score += w.punctuality;
        }

        score
    }

    /// Any early arrival, or late by no more than the grace window.
    /// Patients without a booked time never qualify.
    pub fn arrived_early_or_on_time(&self, patient: &PatientFactors) -> bool {
        patient
            .appointment_offset_minutes()
            .is_some_and(|offset| offset <= self.weights.on_time_grace_minutes)
    }
}

/// Queue order: score descending, then earlier arrival, then id.
pub fn compare_priority(a: (&Patient, f64), b: (&Patient, f64)) -> Ordering {
    b.1.total_cmp(&a.1)
        .then_with(|| a.0.factors.arrival_time.cmp(&b.0.factors.arrival_time))
        .then_with(|| a.0.id.cmp(&b.0.id))
}
