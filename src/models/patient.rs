use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AgeGroup, AppointmentType, PatientStatus};

/// Attributes of a waiting patient that drive scoring and estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFactors {
    /// Caller-assigned severity, 1 (lowest) to 5 (highest).
    pub urgency_level: u8,
    #[serde(default = "default_appointment_type")]
    pub appointment_type: AppointmentType,
    #[serde(default = "default_age_group")]
    pub age_group: AgeGroup,
    #[serde(default)]
    pub special_needs: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub appointment_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub arrival_time: DateTime<Utc>,
    /// Minutes.
    pub estimated_procedure_time: f64,
    /// Minutes waited on previous visits, if known.
    #[serde(default)]
    pub previous_wait_history: Option<f64>,
}

fn default_appointment_type() -> AppointmentType {
    AppointmentType::Regular
}

fn default_age_group() -> AgeGroup {
    AgeGroup::Adult
}

impl PatientFactors {
    /// Signed minutes between arrival and the booked slot.
    /// Negative means the patient arrived early; `None` without a booking.
    pub fn appointment_offset_minutes(&self) -> Option<f64> {
        self.appointment_time
            .map(|booked| (self.arrival_time - booked).num_milliseconds() as f64 / 60_000.0)
    }

    /// Minutes since arrival, never negative.
    pub fn minutes_waited(&self, now: DateTime<Utc>) -> f64 {
        ((now - self.arrival_time).num_milliseconds() as f64 / 60_000.0).max(0.0)
    }
}

/// A patient record as delivered by the patient data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub status: PatientStatus,
    #[serde(flatten)]
    pub factors: PatientFactors,
}
