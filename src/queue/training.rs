//! Synthetic training data for offline wait-time model fitting and for
//! property tests.
//!
//! Realistic wait (minutes):
//! ```text
//! base  = ahead * avg_processing * (peak ? 1.3 : 1.0) * (1 + mean_load * 0.5)
//! wait  = max(0, base * (1 - min(0.6, (urgency - 1) * 0.15))
//!                + procedure * 0.2 + U(-5, 5))
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::features::{extract_features, FeatureVector};
use crate::models::{
    AgeGroup, AppointmentType, FacilityResources, FacilityState, Patient, PatientFactors,
    PatientStatus,
};

const PEAK_MULTIPLIER: f64 = 1.3;
const LOAD_SENSITIVITY: f64 = 0.5;
const URGENCY_DISCOUNT_STEP: f64 = 0.15;
const MAX_URGENCY_DISCOUNT: f64 = 0.6;
const PROCEDURE_SHARE: f64 = 0.2;
const NOISE_MINUTES: f64 = 5.0;

const DEPARTMENTS: [&str; 4] = ["emergency", "cardiology", "radiology", "pediatrics"];

/// One synthetic example.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSample {
    pub patient: Patient,
    pub facility: FacilityState,
    /// Patients ahead in the queue when the sample was drawn.
    pub queue_ahead: u32,
    pub features: FeatureVector,
    pub wait_minutes: f64,
}

/// Seeded generator; the same seed always yields the same samples.
pub struct TrainingDataGenerator {
    rng: StdRng,
    next_id: u64,
}

impl TrainingDataGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
        }
    }

    pub fn generate(&mut self, count: usize, now: DateTime<Utc>) -> Vec<TrainingSample> {
        (0..count).map(|_| self.sample(now)).collect()
    }

    pub fn sample(&mut self, now: DateTime<Utc>) -> TrainingSample {
        let facility = self.facility();
        let patient = self.patient(now);
        let queue_ahead = self.rng.gen_range(0..=facility.current_patient_count);
        let noise = self.rng.gen_range(-NOISE_MINUTES..=NOISE_MINUTES);

        let wait_minutes = realistic_wait(&patient.factors, &facility, queue_ahead, noise);
        let features = extract_features(&patient.factors, &facility);

        TrainingSample {
            patient,
            facility,
            queue_ahead,
            features,
            wait_minutes,
        }
    }

    pub fn facility(&mut self) -> FacilityState {
        let department_loads: BTreeMap<String, f64> = DEPARTMENTS
            .iter()
            .map(|name| (name.to_string(), self.rng.gen_range(0.0..=1.0)))
            .collect();

        FacilityState {
            current_patient_count: self.rng.gen_range(0..=40),
            average_processing_time: self.rng.gen_range(8.0..=45.0),
            peak_hours: self.rng.gen_bool(0.3),
            resources: FacilityResources {
                doctors: self.rng.gen_range(0..=6),
                nurses: self.rng.gen_range(0..=8),
                rooms: self.rng.gen_range(0..=6),
                special_equipment: BTreeMap::new(),
            },
            department_loads,
        }
    }

    pub fn patient(&mut self, now: DateTime<Utc>) -> Patient {
        self.next_id += 1;

        let appointment_type = match self.rng.gen_range(0..4) {
            0 => AppointmentType::Regular,
            1 => AppointmentType::FollowUp,
            2 => AppointmentType::Urgent,
            _ => AppointmentType::Specialist,
        };
        let age_group = match self.rng.gen_range(0..3) {
            0 => AgeGroup::Child,
            1 => AgeGroup::Adult,
            _ => AgeGroup::Senior,
        };

        let arrival_time = now - Duration::minutes(self.rng.gen_range(0..=240));
        let appointment_time = self
            .rng
            .gen_bool(0.6)
            .then(|| arrival_time + Duration::minutes(self.rng.gen_range(-60..=60)));
        let previous_wait_history = self
            .rng
            .gen_bool(0.5)
            .then(|| self.rng.gen_range(0.0..=120.0));

        Patient {
            id: format!("synthetic-{}", self.next_id),
            status: PatientStatus::Waiting,
            factors: PatientFactors {
                urgency_level: self.rng.gen_range(1..=5),
                appointment_type,
                age_group,
                special_needs: self.rng.gen_bool(0.15),
                appointment_time,
                arrival_time,
                estimated_procedure_time: self.rng.gen_range(5.0..=90.0),
                previous_wait_history,
            },
        }
    }
}

/// Hand-tuned ground-truth wait used to label synthetic samples.
pub fn realistic_wait(
    patient: &PatientFactors,
    facility: &FacilityState,
    queue_ahead: u32,
    noise: f64,
) -> f64 {
    let peak = if facility.peak_hours { PEAK_MULTIPLIER } else { 1.0 };
    let load = 1.0 + facility.mean_department_load() * LOAD_SENSITIVITY;
    let base = f64::from(queue_ahead) * facility.average_processing_time * peak * load;

    let discount = (f64::from(patient.urgency_level.saturating_sub(1)) * URGENCY_DISCOUNT_STEP)
        .min(MAX_URGENCY_DISCOUNT);

    (base * (1.0 - discount) + patient.estimated_procedure_time * PROCEDURE_SHARE + noise).max(0.0)
}
