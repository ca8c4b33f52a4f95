//! Core types for the queue engine.
//!
//! These types model one refresh cycle:
//! Patients + Facility → Ranking → Estimates → Allocations → Annotated queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::features::FeatureVector;
use crate::models::Patient;

// ═══════════════════════════════════════════
// Queue item
// ═══════════════════════════════════════════

/// Minimal per-patient ranking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: String,
    pub priority_score: f64,
    /// Minutes, never negative.
    pub predicted_wait_time: f64,
}

// ═══════════════════════════════════════════
// Wait estimates
// ═══════════════════════════════════════════

/// Which estimator produced a wait time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    Model,
    Fallback,
}

impl EstimateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

/// A predicted wait with full internal precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaitEstimate {
    pub minutes: f64,
    pub source: EstimateSource,
}

impl WaitEstimate {
    pub fn fallback(minutes: f64) -> Self {
        Self {
            minutes: minutes.max(0.0),
            source: EstimateSource::Fallback,
        }
    }

    /// Whole minutes for display.
    pub fn display_minutes(&self) -> u32 {
        self.minutes.max(0.0).round() as u32
    }
}

/// Everything a predictor needs for one patient. Owned so it can cross
/// into a blocking task.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub patient_id: String,
    pub features: FeatureVector,
    pub urgency_level: u8,
    pub estimated_procedure_time: f64,
    pub average_processing_time: f64,
    /// Number of patients ahead in the ordered queue (0 = head).
    pub queue_position: usize,
}

// ═══════════════════════════════════════════
// Resource slots
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Doctor,
    Nurse,
    Room,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Room => "room",
        }
    }
}

/// One indexed unit of a constrained resource, e.g. `doctor_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    pub kind: SlotKind,
    pub index: u32,
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.index)
    }
}

/// Slots assigned to one patient in one refresh.
///
/// Serialized as `{resourceType, resourceId}` where the id is the composite
/// `doctor|nurse|room` key with a blank position for an absent nurse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "AllocationRecord")]
pub struct ResourceAllocation {
    pub doctor: SlotId,
    pub nurse: Option<SlotId>,
    pub room: SlotId,
}

impl ResourceAllocation {
    pub fn resource_type(&self) -> &'static str {
        if self.nurse.is_some() {
            "doctor+nurse+room"
        } else {
            "doctor+room"
        }
    }

    pub fn composite_id(&self) -> String {
        let nurse = self.nurse.map(|slot| slot.to_string()).unwrap_or_default();
        format!("{}|{}|{}", self.doctor, nurse, self.room)
    }

    pub fn slots(&self) -> impl Iterator<Item = SlotId> {
        [Some(self.doctor), self.nurse, Some(self.room)]
            .into_iter()
            .flatten()
    }
}

/// Wire form of a `ResourceAllocation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRecord {
    pub resource_type: String,
    pub resource_id: String,
}

impl From<ResourceAllocation> for AllocationRecord {
    fn from(allocation: ResourceAllocation) -> Self {
        Self {
            resource_type: allocation.resource_type().to_string(),
            resource_id: allocation.composite_id(),
        }
    }
}

// ═══════════════════════════════════════════
// Refresh output
// ═══════════════════════════════════════════

/// One patient in the ordered, annotated queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub patient_id: String,
    /// 0-based position in the ordered queue.
    pub position: usize,
    pub priority_score: f64,
    pub current_wait_minutes: f64,
    pub predicted_wait_time: f64,
    pub predicted_wait_display: u32,
    pub estimate_source: EstimateSource,
    pub requires_nurse: bool,
    /// `None` when resources ran out this cycle.
    pub allocation: Option<ResourceAllocation>,
}

impl QueueEntry {
    pub fn as_item(&self) -> QueueItem {
        QueueItem {
            id: self.patient_id.clone(),
            priority_score: self.priority_score,
            predicted_wait_time: self.predicted_wait_time,
        }
    }
}

/// A record excluded from the refresh, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub id: String,
    pub reason: String,
}

/// Aggregate figures for one refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub queued: u32,
    pub allocated: u32,
    pub unallocated: u32,
    pub fallback_estimates: u32,
    pub rejected: u32,
    pub mean_predicted_wait: f64,
}

impl QueueSummary {
    pub fn from_entries(entries: &[QueueEntry], rejected: usize) -> Self {
        let queued = entries.len() as u32;
        let allocated = entries.iter().filter(|e| e.allocation.is_some()).count() as u32;
        let fallback_estimates = entries
            .iter()
            .filter(|e| e.estimate_source == EstimateSource::Fallback)
            .count() as u32;
        let mean_predicted_wait = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.predicted_wait_time).sum::<f64>() / entries.len() as f64
        };

        Self {
            queued,
            allocated,
            unallocated: queued - allocated,
            fallback_estimates,
            rejected: rejected as u32,
            mean_predicted_wait,
        }
    }
}

/// Result of one orchestrator refresh. A pure function of its inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<QueueEntry>,
    pub rejected: Vec<RejectedRecord>,
    pub summary: QueueSummary,
}

impl RefreshOutcome {
    pub fn entry(&self, patient_id: &str) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.patient_id == patient_id)
    }

    /// The ranked queue without allocation detail, in queue order.
    pub fn items(&self) -> Vec<QueueItem> {
        self.entries.iter().map(QueueEntry::as_item).collect()
    }
}

/// Patients loaded from a source, with records that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct PatientBatch {
    pub patients: Vec<Patient>,
    pub rejected: Vec<RejectedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(kind: SlotKind, index: u32) -> SlotId {
        SlotId { kind, index }
    }

    #[test]
    fn composite_id_with_nurse() {
        let allocation = ResourceAllocation {
            doctor: slot(SlotKind::Doctor, 0),
            nurse: Some(slot(SlotKind::Nurse, 1)),
            room: slot(SlotKind::Room, 2),
        };
        assert_eq!(allocation.composite_id(), "doctor_0|nurse_1|room_2");
        assert_eq!(allocation.resource_type(), "doctor+nurse+room");
        assert_eq!(allocation.slots().count(), 3);
    }

    #[test]
    fn composite_id_leaves_nurse_blank() {
        let allocation = ResourceAllocation {
            doctor: slot(SlotKind::Doctor, 3),
            nurse: None,
            room: slot(SlotKind::Room, 0),
        };
        assert_eq!(allocation.composite_id(), "doctor_3||room_0");
        assert_eq!(allocation.resource_type(), "doctor+room");
    }

    #[test]
    fn allocation_serializes_as_record() {
        let allocation = ResourceAllocation {
            doctor: slot(SlotKind::Doctor, 0),
            nurse: None,
            room: slot(SlotKind::Room, 0),
        };
        let json = serde_json::to_value(&allocation).unwrap();
        assert_eq!(json["resourceType"], "doctor+room");
        assert_eq!(json["resourceId"], "doctor_0||room_0");
    }

    #[test]
    fn display_minutes_rounds() {
        assert_eq!(WaitEstimate::fallback(12.49).display_minutes(), 12);
        assert_eq!(WaitEstimate::fallback(12.5).display_minutes(), 13);
        assert_eq!(WaitEstimate::fallback(-3.0).minutes, 0.0);
    }

    fn entry(id: &str, position: usize, score: f64, wait: f64) -> QueueEntry {
        QueueEntry {
            patient_id: id.to_string(),
            position,
            priority_score: score,
            current_wait_minutes: 0.0,
            predicted_wait_time: wait,
            predicted_wait_display: wait.round() as u32,
            estimate_source: EstimateSource::Fallback,
            requires_nurse: false,
            allocation: None,
        }
    }

    #[test]
    fn items_follow_queue_order() {
        let entries = vec![entry("high", 0, 61.5, 4.0), entry("low", 1, 30.25, 20.5)];
        let outcome = RefreshOutcome {
            generated_at: DateTime::<Utc>::from_timestamp_millis(0).unwrap(),
            summary: QueueSummary::from_entries(&entries, 0),
            entries,
            rejected: Vec::new(),
        };

        let items = outcome.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "high");
        assert_eq!(items[1].predicted_wait_time, 20.5);

        let json = serde_json::to_value(&items).unwrap();
        assert_eq!(json[0]["priorityScore"], 61.5);
        assert_eq!(json[1]["predictedWaitTime"], 20.5);
        assert!(json[0].get("allocation").is_none());
    }

    #[test]
    fn summary_of_empty_queue() {
        let summary = QueueSummary::from_entries(&[], 2);
        assert_eq!(summary.queued, 0);
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.mean_predicted_wait, 0.0);
    }
}
