//! Property tests for the queue engine's public surface.
//!
//! Inputs come from the seeded synthetic generator, so every failing case
//! shrinks to a reproducible seed.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use patient_flow::config::QueueConfig;
use patient_flow::models::{FacilityState, Patient};
use patient_flow::queue::allocator::requires_nurse;
use patient_flow::queue::{
    EstimateSource, NursePolicy, PriorityScorer, PriorityWeights, QueueOrchestrator,
    TrainingDataGenerator, WaitTimeEstimator,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
}

fn scenario(seed: u64, count: usize) -> (Vec<Patient>, FacilityState) {
    let mut generator = TrainingDataGenerator::new(seed);
    let facility = generator.facility();
    let patients = (0..count).map(|_| generator.patient(now())).collect();
    (patients, facility)
}

fn orchestrator(policy: NursePolicy) -> QueueOrchestrator {
    let config = QueueConfig {
        nurse_policy: policy,
        ..QueueConfig::default()
    };
    QueueOrchestrator::new(&config, WaitTimeEstimator::fallback_only())
}

fn nurse_policy() -> impl Strategy<Value = NursePolicy> {
    prop_oneof![Just(NursePolicy::BestEffort), Just(NursePolicy::Required)]
}

proptest! {
    #[test]
    fn higher_urgency_never_scores_lower(seed in any::<u64>(), wait in 0.0f64..600.0) {
        let mut generator = TrainingDataGenerator::new(seed);
        let mut factors = generator.patient(now()).factors;
        factors.urgency_level = factors.urgency_level.min(4);

        let scorer = PriorityScorer::new(PriorityWeights::default());
        let lower = scorer.score(&factors, wait);
        factors.urgency_level += 1;
        let higher = scorer.score(&factors, wait);

        prop_assert!(higher > lower, "{higher} <= {lower}");
    }

    #[test]
    fn predicted_waits_are_finite_and_non_negative(
        seed in any::<u64>(),
        count in 0usize..25,
        no_resources in any::<bool>(),
    ) {
        let (patients, mut facility) = scenario(seed, count);
        if no_resources {
            facility.resources.doctors = 0;
            facility.resources.nurses = 0;
            facility.resources.rooms = 0;
        }

        let outcome = orchestrator(NursePolicy::BestEffort)
            .refresh(&patients, &facility, now())
            .unwrap();

        prop_assert_eq!(outcome.entries.len(), count);
        for entry in &outcome.entries {
            prop_assert!(entry.predicted_wait_time.is_finite());
            prop_assert!(entry.predicted_wait_time >= 0.0);
            prop_assert_eq!(entry.estimate_source, EstimateSource::Fallback);
            if no_resources {
                prop_assert!(entry.allocation.is_none());
            }
        }
    }

    #[test]
    fn no_slot_is_assigned_twice(seed in any::<u64>(), count in 0usize..30, policy in nurse_policy()) {
        let (patients, facility) = scenario(seed, count);
        let outcome = orchestrator(policy).refresh(&patients, &facility, now()).unwrap();

        let mut seen = HashSet::new();
        for allocation in outcome.entries.iter().filter_map(|e| e.allocation.as_ref()) {
            for slot in allocation.slots() {
                prop_assert!(seen.insert(slot), "slot {slot} assigned twice");
            }
        }

        let allocated = outcome.entries.iter().filter(|e| e.allocation.is_some()).count();
        let capacity = facility.resources.doctors.min(facility.resources.rooms) as usize;
        prop_assert!(allocated <= capacity);
    }

    #[test]
    fn nurses_only_go_to_patients_who_need_one(
        seed in any::<u64>(),
        count in 0usize..30,
        policy in nurse_policy(),
    ) {
        let (patients, facility) = scenario(seed, count);
        let outcome = orchestrator(policy).refresh(&patients, &facility, now()).unwrap();

        for patient in &patients {
            let entry = outcome.entry(&patient.id).unwrap();
            let has_nurse = entry
                .allocation
                .as_ref()
                .is_some_and(|a| a.nurse.is_some());
            if !requires_nurse(&patient.factors) {
                prop_assert!(!has_nurse, "{} got a nurse", patient.id);
            }
            if policy == NursePolicy::Required && entry.requires_nurse {
                prop_assert!(entry.allocation.is_none() || has_nurse);
            }
        }
    }

    #[test]
    fn queue_is_sorted_by_priority(seed in any::<u64>(), count in 0usize..30) {
        let (patients, facility) = scenario(seed, count);
        let outcome = orchestrator(NursePolicy::BestEffort)
            .refresh(&patients, &facility, now())
            .unwrap();

        for (position, entry) in outcome.entries.iter().enumerate() {
            prop_assert_eq!(entry.position, position);
        }
        for pair in outcome.entries.windows(2) {
            prop_assert!(pair[0].priority_score >= pair[1].priority_score);
            if pair[0].priority_score == pair[1].priority_score {
                let arrival = |id: &str| {
                    patients.iter().find(|p| p.id == id).unwrap().factors.arrival_time
                };
                prop_assert!(arrival(&pair[0].patient_id) <= arrival(&pair[1].patient_id));
            }
        }
    }

    #[test]
    fn refresh_is_idempotent(seed in any::<u64>(), count in 0usize..20) {
        let (patients, facility) = scenario(seed, count);
        let orchestrator = orchestrator(NursePolicy::BestEffort);

        let first = orchestrator.refresh(&patients, &facility, now()).unwrap();
        let second = orchestrator.refresh(&patients, &facility, now()).unwrap();
        prop_assert_eq!(first, second);
    }
}
