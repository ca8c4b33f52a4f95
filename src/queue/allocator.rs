//! Greedy resource allocation in queue order.
//!
//! Rules:
//! - every patient needs one doctor and one room, or gets nothing
//! - a nurse is needed iff urgency >= 3 or special needs
//! - under `NursePolicy::BestEffort` a missing nurse leaves a blank slot and
//!   does not block doctor + room; `NursePolicy::Required` blocks instead
//! - slots come from per-refresh pools, first free index wins

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{ResourceAllocation, SlotId, SlotKind};
use crate::models::{FacilityState, Patient, PatientFactors};

/// Urgency at or above which a nurse is required.
pub const NURSE_URGENCY_THRESHOLD: u8 = 3;

/// What to do when a patient needs a nurse and none is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NursePolicy {
    /// Allocate doctor + room anyway, nurse position left blank.
    BestEffort,
    /// No allocation at all without the nurse.
    Required,
}

pub fn requires_nurse(patient: &PatientFactors) -> bool {
    patient.urgency_level >= NURSE_URGENCY_THRESHOLD || patient.special_needs
}

// ═══════════════════════════════════════════
// Slot pool
// ═══════════════════════════════════════════

/// Fixed-capacity arena of one slot kind.
#[derive(Debug, Clone)]
pub struct SlotPool {
    kind: SlotKind,
    occupied: Vec<bool>,
}

impl SlotPool {
    pub fn new(kind: SlotKind, capacity: u32) -> Self {
        Self {
            kind,
            occupied: vec![false; capacity as usize],
        }
    }

    /// Take the lowest free slot.
    pub fn acquire(&mut self) -> Option<SlotId> {
        let index = self.occupied.iter().position(|taken| !taken)?;
        self.occupied[index] = true;
        Some(SlotId {
            kind: self.kind,
            index: index as u32,
        })
    }

    /// Return a slot. Slots of another kind or out of range are ignored.
    pub fn release(&mut self, slot: SlotId) {
        if slot.kind != self.kind {
            return;
        }
        if let Some(taken) = self.occupied.get_mut(slot.index as usize) {
            *taken = false;
        }
    }

    pub fn available(&self) -> usize {
        self.occupied.iter().filter(|taken| !**taken).count()
    }

    pub fn capacity(&self) -> usize {
        self.occupied.len()
    }
}

/// The three pools for one refresh.
#[derive(Debug, Clone)]
pub struct ResourcePools {
    pub doctors: SlotPool,
    pub nurses: SlotPool,
    pub rooms: SlotPool,
}

impl ResourcePools {
    pub fn for_facility(facility: &FacilityState) -> Self {
        let resources = &facility.resources;
        Self {
            doctors: SlotPool::new(SlotKind::Doctor, resources.doctors),
            nurses: SlotPool::new(SlotKind::Nurse, resources.nurses),
            rooms: SlotPool::new(SlotKind::Room, resources.rooms),
        }
    }

    fn release(&mut self, slot: SlotId) {
        match slot.kind {
            SlotKind::Doctor => self.doctors.release(slot),
            SlotKind::Nurse => self.nurses.release(slot),
            SlotKind::Room => self.rooms.release(slot),
        }
    }
}

// ═══════════════════════════════════════════
// Allocator
// ═══════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    nurse_policy: NursePolicy,
}

impl Default for ResourceAllocator {
    fn default() -> Self {
        Self::new(NursePolicy::BestEffort)
    }
}

impl ResourceAllocator {
    pub fn new(nurse_policy: NursePolicy) -> Self {
        Self { nurse_policy }
    }

    /// Allocate over an already ordered queue. Patients missing from the
    /// map are unallocated this cycle.
    pub fn allocate(
        &self,
        ordered: &[&Patient],
        facility: &FacilityState,
    ) -> BTreeMap<String, ResourceAllocation> {
        let mut pools = ResourcePools::for_facility(facility);
        let mut allocations = BTreeMap::new();

        for patient in ordered {
            match self.allocate_one(&patient.factors, &mut pools) {
                Some(allocation) => {
                    tracing::debug!(
                        patient_id = %patient.id,
                        resources = %allocation.composite_id(),
                        "Allocated resources"
                    );
                    allocations.insert(patient.id.clone(), allocation);
                }
                None => {
                    tracing::debug!(patient_id = %patient.id, "No resources available");
                }
            }
        }

        allocations
    }

    fn allocate_one(
        &self,
        patient: &PatientFactors,
        pools: &mut ResourcePools,
    ) -> Option<ResourceAllocation> {
        let doctor = pools.doctors.acquire()?;
        let Some(room) = pools.rooms.acquire() else {
            pools.release(doctor);
            return None;
        };

        let nurse = if requires_nurse(patient) {
            let nurse = pools.nurses.acquire();
            if nurse.is_none() && self.nurse_policy == NursePolicy::Required {
                pools.release(doctor);
                pools.release(room);
                return None;
            }
            nurse
        } else {
            None
        };

        Some(ResourceAllocation {
            doctor,
            nurse,
            room,
        })
    }
}
