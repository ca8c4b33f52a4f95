//! Queue prioritization and wait-time estimation engine.
//!
//! ## Architecture
//!
//! Five stages connected by plain data, one seam trait for prediction:
//! ```text
//! Features → Priority → Wait estimate → Allocation → Orchestrator
//! ```
//! The orchestrator is a pure function of (patients, facility, now). The
//! service and background modules feed it from sources and write results
//! back through a sink.

pub mod error;
pub mod types;
pub mod traits;
pub mod features;
pub mod priority;
pub mod estimator;
pub mod allocator;
pub mod validation;
pub mod orchestrator;
pub mod service;
pub mod background;
pub mod snapshot;
pub mod training;

pub use error::{EstimationError, QueueError, SinkError, ValidationError};
pub use types::*;
pub use traits::*;
pub use features::{extract_features, FeatureVector, FEATURE_COUNT};
pub use priority::{PriorityScorer, PriorityWeights};
pub use estimator::{FallbackEstimator, LinearWaitModel, WaitTimeEstimator};
pub use allocator::{NursePolicy, ResourceAllocator};
pub use orchestrator::QueueOrchestrator;
pub use service::{QueueService, RefreshReport};
pub use background::{start_periodic_refresh, RefreshSchedulerHandle};
pub use snapshot::{JsonFileSink, JsonFileSource, MemorySink, QueueSnapshot, StaticSource};
pub use training::{TrainingDataGenerator, TrainingSample};
