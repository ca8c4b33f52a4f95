//! JSON snapshot sources and simple sinks.
//!
//! Snapshot layout:
//! ```text
//! { "facility": { ...FacilityState... }, "patients": [ ...Patient... ] }
//! ```
//! Patients are parsed one by one; a malformed record is rejected alone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use serde_json::Value;

use super::error::{QueueError, SinkError};
use super::traits::{FacilitySource, PatientSource, QueueSink};
use super::types::{PatientBatch, QueueEntry};
use super::validation::parse_patient_records;
use crate::models::FacilityState;

#[derive(Deserialize)]
struct RawSnapshot {
    facility: FacilityState,
    #[serde(default)]
    patients: Vec<Value>,
}

/// Facility state plus the parsed patient set.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub facility: FacilityState,
    pub patients: PatientBatch,
}

impl QueueSnapshot {
    pub fn from_json(raw: &str) -> Result<Self, QueueError> {
        let raw: RawSnapshot = serde_json::from_str(raw)?;
        Ok(Self {
            facility: raw.facility,
            patients: parse_patient_records(raw.patients),
        })
    }

    pub fn load(path: &Path) -> Result<Self, QueueError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

/// Fixed in-memory snapshot serving as both patient and facility source.
#[derive(Debug, Clone)]
pub struct StaticSource {
    snapshot: Arc<QueueSnapshot>,
}

impl StaticSource {
    pub fn new(snapshot: QueueSnapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }
}

impl PatientSource for StaticSource {
    fn load_patients(&self) -> Result<PatientBatch, QueueError> {
        Ok(self.snapshot.patients.clone())
    }
}

impl FacilitySource for StaticSource {
    fn load_facility(&self) -> Result<FacilityState, QueueError> {
        Ok(self.snapshot.facility.clone())
    }
}

/// Snapshot file re-read on every refresh, so edits show up on the next one.
///
/// `load_patients` parses the file once and stages its facility for the
/// `load_facility` call that follows, so both halves of a refresh come from
/// the same version of the file. Clones share the staged facility.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    staged_facility: Arc<Mutex<Option<FacilityState>>>,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            staged_facility: Arc::new(Mutex::new(None)),
        }
    }

    fn read(&self) -> Result<QueueSnapshot, QueueError> {
        QueueSnapshot::load(&self.path).map_err(|e| {
            QueueError::Source(format!("{}: {e}", self.path.display()))
        })
    }

    fn stage(&self, facility: Option<FacilityState>) {
        if let Ok(mut staged) = self.staged_facility.lock() {
            *staged = facility;
        }
    }

    fn take_staged(&self) -> Option<FacilityState> {
        self.staged_facility.lock().ok().and_then(|mut staged| staged.take())
    }
}

impl PatientSource for JsonFileSource {
    fn load_patients(&self) -> Result<PatientBatch, QueueError> {
        match self.read() {
            Ok(snapshot) => {
                self.stage(Some(snapshot.facility));
                Ok(snapshot.patients)
            }
            Err(e) => {
                self.stage(None);
                Err(e)
            }
        }
    }
}

impl FacilitySource for JsonFileSource {
    fn load_facility(&self) -> Result<FacilityState, QueueError> {
        match self.take_staged() {
            Some(facility) => Ok(facility),
            None => Ok(self.read()?.facility),
        }
    }
}

/// Keeps the most recent write-back in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    last: Mutex<Vec<QueueEntry>>,
}

impl MemorySink {
    pub fn last_written(&self) -> Vec<QueueEntry> {
        self.last.lock().map(|entries| entries.clone()).unwrap_or_default()
    }
}

impl QueueSink for MemorySink {
    fn write_back(&self, entries: &[QueueEntry]) -> Result<(), SinkError> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| SinkError::Rejected("sink lock poisoned".to_string()))?;
        *last = entries.to_vec();
        Ok(())
    }
}

/// Writes each refresh as pretty JSON, replacing the previous file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QueueSink for JsonFileSink {
    fn write_back(&self, entries: &[QueueEntry]) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| SinkError::Rejected(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::types::EstimateSource;

    const SNAPSHOT: &str = r#"{
        "facility": {
            "currentPatientCount": 3,
            "averageProcessingTime": 12,
            "peakHours": true,
            "resources": {"doctors": 2, "nurses": 1, "rooms": 2, "specialEquipment": {"xray": 1}},
            "departmentLoads": {"er": 0.9}
        },
        "patients": [
            {"id": "a", "urgencyLevel": 3, "arrivalTime": 1000, "estimatedProcedureTime": 15},
            {"id": "b", "urgencyLevel": 3}
        ]
    }"#;

    fn entry(id: &str) -> QueueEntry {
        QueueEntry {
            patient_id: id.to_string(),
            position: 0,
            priority_score: 40.0,
            current_wait_minutes: 3.0,
            predicted_wait_time: 7.4,
            predicted_wait_display: 7,
            estimate_source: EstimateSource::Fallback,
            requires_nurse: false,
            allocation: None,
        }
    }

    #[test]
    fn parses_snapshot() {
        let snapshot = QueueSnapshot::from_json(SNAPSHOT).unwrap();
        assert_eq!(snapshot.facility.resources.special_equipment["xray"], 1);
        assert_eq!(snapshot.patients.patients.len(), 1);
        assert_eq!(snapshot.patients.rejected[0].id, "b");
    }

    #[test]
    fn snapshot_without_facility_fails() {
        assert!(matches!(
            QueueSnapshot::from_json(r#"{"patients": []}"#),
            Err(QueueError::Json(_))
        ));
    }

    #[test]
    fn file_source_rereads_between_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let source = JsonFileSource::new(&path);
        assert_eq!(source.load_patients().unwrap().patients.len(), 1);
        assert!(source.load_facility().unwrap().peak_hours);

        std::fs::write(&path, SNAPSHOT.replace("\"peakHours\": true", "\"peakHours\": false")).unwrap();
        source.load_patients().unwrap();
        assert!(!source.load_facility().unwrap().peak_hours);
    }

    #[test]
    fn one_refresh_sees_one_file_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let patients = JsonFileSource::new(&path);
        let facility = patients.clone();
        assert_eq!(patients.load_patients().unwrap().patients.len(), 1);

        // Edited between the two halves of the same refresh.
        std::fs::write(&path, SNAPSHOT.replace("\"peakHours\": true", "\"peakHours\": false")).unwrap();
        assert!(facility.load_facility().unwrap().peak_hours);

        // Nothing staged any more: a lone facility load reads the file.
        assert!(!facility.load_facility().unwrap().peak_hours);
    }

    #[test]
    fn missing_file_is_source_error() {
        let source = JsonFileSource::new("/nonexistent/snapshot.json");
        assert!(matches!(source.load_patients(), Err(QueueError::Source(_))));
    }

    #[test]
    fn memory_sink_keeps_last_write() {
        let sink = MemorySink::default();
        sink.write_back(&[entry("a"), entry("b")]).unwrap();
        sink.write_back(&[entry("c")]).unwrap();
        let last = sink.last_written();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].patient_id, "c");
    }

    #[test]
    fn file_sink_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        JsonFileSink::new(&path).write_back(&[entry("a")]).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written[0]["patientId"], "a");
        assert_eq!(written[0]["predictedWaitDisplay"], 7);
        assert_eq!(written[0]["estimateSource"], "fallback");
        assert!(written[0]["allocation"].is_null());
    }
}
