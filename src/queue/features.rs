//! Feature extraction: patient + facility snapshot → fixed numeric vector.
//!
//! Field order is part of the model contract; trained weights index into it.

use crate::models::{FacilityState, PatientFactors};

pub const FEATURE_COUNT: usize = 10;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Names in vector order, for logs and model files.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "urgency_level",
    "appointment_type_weight",
    "age_group_weight",
    "special_needs",
    "appointment_time_factor",
    "estimated_procedure_time",
    "previous_wait_history",
    "current_patient_count",
    "average_processing_time",
    "peak_hours",
];

/// Build the feature vector. Never fails.
pub fn extract_features(patient: &PatientFactors, facility: &FacilityState) -> FeatureVector {
    [
        f64::from(patient.urgency_level),
        patient.appointment_type.weight(),
        patient.age_group.weight(),
        flag(patient.special_needs),
        appointment_time_factor(patient),
        patient.estimated_procedure_time,
        patient.previous_wait_history.unwrap_or(0.0),
        f64::from(facility.current_patient_count),
        facility.average_processing_time,
        flag(facility.peak_hours),
    ]
}

/// (arrival − appointment) in hours; negative = early, 0 without a booking.
pub fn appointment_time_factor(patient: &PatientFactors) -> f64 {
    patient
        .appointment_offset_minutes()
        .map(|minutes| minutes / 60.0)
        .unwrap_or(0.0)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}
