use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Staff and room capacity of the facility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityResources {
    pub doctors: u32,
    pub nurses: u32,
    pub rooms: u32,
    /// Named special-equipment counts (e.g. "ultrasound" -> 2).
    #[serde(default)]
    pub special_equipment: BTreeMap<String, u32>,
}

/// Snapshot of facility configuration at refresh time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityState {
    #[serde(default)]
    pub current_patient_count: u32,
    /// Minutes per patient, must be positive.
    pub average_processing_time: f64,
    #[serde(default)]
    pub peak_hours: bool,
    #[serde(default)]
    pub resources: FacilityResources,
    /// Department -> load fraction in [0, 1].
    #[serde(default)]
    pub department_loads: BTreeMap<String, f64>,
}

impl FacilityState {
    /// Mean department load, 0 when no departments are reported.
    pub fn mean_department_load(&self) -> f64 {
        if self.department_loads.is_empty() {
            return 0.0;
        }
        self.department_loads.values().sum::<f64>() / self.department_loads.len() as f64
    }
}
