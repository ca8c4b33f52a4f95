//! Record validation. A bad record is rejected on its own; the rest of the
//! batch carries on.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::error::ValidationError;
use super::types::{PatientBatch, RejectedRecord};
use crate::models::{FacilityState, Patient};

/// Id used in rejections when a record carries none.
pub const UNKNOWN_ID: &str = "<unknown>";

pub fn validate_patient(patient: &Patient, now: DateTime<Utc>) -> Result<(), ValidationError> {
    let f = &patient.factors;

    if patient.id.trim().is_empty() {
        return Err(ValidationError::MissingId);
    }
    if !(1..=5).contains(&f.urgency_level) {
        return Err(ValidationError::UrgencyOutOfRange(f.urgency_level));
    }
    if f.arrival_time > now {
        let minutes_ahead = (f.arrival_time - now).num_milliseconds() as f64 / 60_000.0;
        return Err(ValidationError::ArrivalInFuture { minutes_ahead });
    }
    if !(f.estimated_procedure_time.is_finite() && f.estimated_procedure_time > 0.0) {
        return Err(ValidationError::NonPositiveProcedureTime(
            f.estimated_procedure_time,
        ));
    }
    if let Some(history) = f.previous_wait_history {
        if !(history.is_finite() && history >= 0.0) {
            return Err(ValidationError::NegativeWaitHistory(history));
        }
    }

    Ok(())
}

pub fn validate_facility(facility: &FacilityState) -> Result<(), ValidationError> {
    let avg = facility.average_processing_time;
    if !(avg.is_finite() && avg > 0.0) {
        return Err(ValidationError::NonPositiveProcessingTime(avg));
    }

    for (department, &value) in &facility.department_loads {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::LoadOutOfRange {
                department: department.clone(),
                value,
            });
        }
    }

    Ok(())
}

/// Split patients into valid ones (first occurrence of each id) and
/// rejections, preserving input order.
pub fn partition_valid<'a>(
    patients: &'a [Patient],
    now: DateTime<Utc>,
) -> (Vec<&'a Patient>, Vec<RejectedRecord>) {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(patients.len());
    let mut rejected = Vec::new();

    for patient in patients {
        let result = validate_patient(patient, now).and_then(|()| {
            if seen.insert(patient.id.as_str()) {
                Ok(())
            } else {
                Err(ValidationError::DuplicateId(patient.id.clone()))
            }
        });

        match result {
            Ok(()) => valid.push(patient),
            Err(e) => {
                tracing::warn!(patient_id = %patient.id, error = %e, "Rejected patient record");
                rejected.push(reject(&patient.id, &e));
            }
        }
    }

    (valid, rejected)
}

/// Deserialize raw boundary records one by one so a malformed record only
/// costs itself.
pub fn parse_patient_records(records: Vec<Value>) -> PatientBatch {
    let mut batch = PatientBatch::default();

    for record in records {
        let id = record
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ID)
            .to_string();

        match serde_json::from_value::<Patient>(record) {
            Ok(patient) => batch.patients.push(patient),
            Err(e) => {
                let error = ValidationError::Malformed(e.to_string());
                tracing::warn!(patient_id = %id, error = %error, "Rejected patient record");
                batch.rejected.push(reject(&id, &error));
            }
        }
    }

    batch
}

fn reject(id: &str, error: &ValidationError) -> RejectedRecord {
    RejectedRecord {
        id: if id.is_empty() { UNKNOWN_ID.to_string() } else { id.to_string() },
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AgeGroup, AppointmentType, FacilityResources, PatientFactors, PatientStatus};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    fn patient(id: &str) -> Patient {
        Patient {
            id: id.to_string(),
            status: PatientStatus::Waiting,
            factors: PatientFactors {
                urgency_level: 3,
                appointment_type: AppointmentType::Regular,
                age_group: AgeGroup::Adult,
                special_needs: false,
                appointment_time: None,
                arrival_time: now() - Duration::minutes(10),
                estimated_procedure_time: 20.0,
                previous_wait_history: None,
            },
        }
    }

    fn facility() -> FacilityState {
        FacilityState {
            current_patient_count: 2,
            average_processing_time: 15.0,
            peak_hours: false,
            resources: FacilityResources::default(),
            department_loads: Default::default(),
        }
    }

    #[test]
    fn accepts_valid_patient() {
        assert_eq!(validate_patient(&patient("p1"), now()), Ok(()));
    }

    #[test]
    fn arrival_exactly_now_is_valid() {
        let mut p = patient("p1");
        p.factors.arrival_time = now();
        assert_eq!(validate_patient(&p, now()), Ok(()));
    }

    #[test]
    fn rejects_out_of_range_urgency() {
        for urgency in [0, 6, 255] {
            let mut p = patient("p1");
            p.factors.urgency_level = urgency;
            assert_eq!(
                validate_patient(&p, now()),
                Err(ValidationError::UrgencyOutOfRange(urgency))
            );
        }
    }

    #[test]
    fn rejects_future_arrival() {
        let mut p = patient("p1");
        p.factors.arrival_time = now() + Duration::minutes(30);
        assert!(matches!(
            validate_patient(&p, now()),
            Err(ValidationError::ArrivalInFuture { .. })
        ));
    }

    #[test]
    fn rejects_bad_procedure_time_and_history() {
        let mut p = patient("p1");
        p.factors.estimated_procedure_time = 0.0;
        assert!(matches!(
            validate_patient(&p, now()),
            Err(ValidationError::NonPositiveProcedureTime(_))
        ));

        let mut p = patient("p1");
        p.factors.previous_wait_history = Some(-1.0);
        assert!(matches!(
            validate_patient(&p, now()),
            Err(ValidationError::NegativeWaitHistory(_))
        ));
    }

    #[test]
    fn rejects_blank_id() {
        assert_eq!(validate_patient(&patient("  "), now()), Err(ValidationError::MissingId));
    }

    #[test]
    fn facility_checks() {
        assert_eq!(validate_facility(&facility()), Ok(()));

        let mut f = facility();
        f.average_processing_time = 0.0;
        assert!(matches!(
            validate_facility(&f),
            Err(ValidationError::NonPositiveProcessingTime(_))
        ));

        let mut f = facility();
        f.department_loads.insert("er".to_string(), 1.2);
        assert!(matches!(
            validate_facility(&f),
            Err(ValidationError::LoadOutOfRange { .. })
        ));
    }

    #[test]
    fn partition_keeps_order_and_reports_ids() {
        let mut bad = patient("bad");
        bad.factors.urgency_level = 9;
        let patients = vec![patient("a"), bad, patient("b"), patient("a")];

        let (valid, rejected) = partition_valid(&patients, now());
        let ids: Vec<&str> = valid.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].id, "bad");
        assert!(rejected[1].reason.contains("Duplicate"));
    }

    #[test]
    fn parse_rejects_only_malformed_records() {
        let records = vec![
            json!({"id": "ok", "urgencyLevel": 2, "arrivalTime": 0, "estimatedProcedureTime": 10}),
            json!({"id": "no-arrival", "urgencyLevel": 2, "estimatedProcedureTime": 10}),
            json!({"urgencyLevel": -1}),
        ];

        let batch = parse_patient_records(records);
        assert_eq!(batch.patients.len(), 1);
        assert_eq!(batch.patients[0].id, "ok");
        assert_eq!(batch.rejected.len(), 2);
        assert_eq!(batch.rejected[0].id, "no-arrival");
        assert_eq!(batch.rejected[1].id, UNKNOWN_ID);
        assert!(batch.rejected[0].reason.starts_with("Malformed record"));
    }
}
