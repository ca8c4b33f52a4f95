//! Wait-time estimation: an optional model-backed predictor chained in front
//! of the deterministic fallback.
//!
//! Fallback formula (minutes):
//! `max(0, position * avg_processing * 0.8 + 5 * (5 - urgency) + procedure * 0.2)`
//!
//! Any primary failure (error, negative or non-finite output, panic,
//! timeout) degrades that one patient to the fallback. A batch never fails
//! because of a predictor.

use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::{EstimationError, QueueError};
use super::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use super::traits::WaitTimePredictor;
use super::types::{EstimateSource, PredictionRequest, WaitEstimate};

// ═══════════════════════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════════════════════

/// Share of the average processing time each patient ahead contributes.
const QUEUE_PROCESSING_FACTOR: f64 = 0.8;

/// Minutes added per urgency level below the maximum.
const URGENCY_STEP_MINUTES: f64 = 5.0;

/// Share of the patient's own procedure time added to the wait.
const PROCEDURE_FACTOR: f64 = 0.2;

const MAX_URGENCY: f64 = 5.0;

// ═══════════════════════════════════════════════════════════
// Fallback
// ═══════════════════════════════════════════════════════════

/// Deterministic wait formula. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEstimator;

impl FallbackEstimator {
    pub fn estimate(&self, request: &PredictionRequest) -> f64 {
        let raw = request.queue_position as f64
            * request.average_processing_time
            * QUEUE_PROCESSING_FACTOR
            + URGENCY_STEP_MINUTES * (MAX_URGENCY - f64::from(request.urgency_level))
            + request.estimated_procedure_time * PROCEDURE_FACTOR;

        if raw.is_finite() {
            raw.max(0.0)
        } else {
            0.0
        }
    }
}

impl WaitTimePredictor for FallbackEstimator {
    fn name(&self) -> &str {
        "fallback"
    }

    fn predict(&self, request: &PredictionRequest) -> Result<f64, EstimationError> {
        Ok(self.estimate(request))
    }
}

// ═══════════════════════════════════════════════════════════
// Linear model
// ═══════════════════════════════════════════════════════════

/// Regression weights over the feature vector, trained offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWaitModel {
    /// Feature names in the order the weights were fitted.
    #[serde(default = "default_feature_names")]
    pub features: Vec<String>,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

fn default_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}

impl LinearWaitModel {
    pub fn new(weights: FeatureVector, bias: f64) -> Self {
        Self {
            features: default_feature_names(),
            weights: weights.to_vec(),
            bias,
        }
    }

    /// Load weights from a JSON model file.
    pub fn load(path: &Path) -> Result<Self, QueueError> {
        let raw = std::fs::read_to_string(path)?;
        let model: LinearWaitModel = serde_json::from_str(&raw)?;
        model.check_layout()?;
        tracing::info!(path = %path.display(), "Loaded wait-time model");
        Ok(model)
    }

    fn check_layout(&self) -> Result<(), QueueError> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(QueueError::Model(format!(
                "expected {FEATURE_COUNT} weights, found {}",
                self.weights.len()
            )));
        }
        if self.features.iter().map(String::as_str).ne(FEATURE_NAMES) {
            return Err(QueueError::Model(format!(
                "feature order mismatch: {:?}",
                self.features
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(QueueError::Model("non-finite weight".to_string()));
        }
        Ok(())
    }
}

impl WaitTimePredictor for LinearWaitModel {
    fn name(&self) -> &str {
        "linear"
    }

    fn predict(&self, request: &PredictionRequest) -> Result<f64, EstimationError> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(EstimationError::Unavailable(format!(
                "model has {} weights",
                self.weights.len()
            )));
        }

        let value = self
            .weights
            .iter()
            .zip(request.features.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(EstimationError::NonFinite)
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Chained estimator
// ═══════════════════════════════════════════════════════════

/// Predictions allowed to run at once when no limit is configured.
const DEFAULT_MAX_IN_FLIGHT: usize = 8;

/// Primary predictor (optional) with the fallback as escape hatch.
///
/// Every primary call runs off the caller's thread under `timeout` and
/// holds one of `max_in_flight` shared slots until the call really ends.
/// A predictor that hangs keeps its slot, so a stuck model degrades later
/// requests to the fallback instead of piling up threads.
#[derive(Clone)]
pub struct WaitTimeEstimator {
    primary: Option<Arc<dyn WaitTimePredictor>>,
    fallback: FallbackEstimator,
    timeout: Duration,
    slots: Arc<Semaphore>,
}

impl std::fmt::Debug for WaitTimeEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitTimeEstimator")
            .field("primary", &self.primary.as_ref().map(|p| p.name().to_string()))
            .field("timeout", &self.timeout)
            .field("free_slots", &self.slots.available_permits())
            .finish()
    }
}

impl WaitTimeEstimator {
    /// Deterministic fallback only.
    pub fn fallback_only() -> Self {
        Self {
            primary: None,
            fallback: FallbackEstimator,
            timeout: Duration::from_millis(250),
            slots: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    /// Model-backed estimator; `timeout` bounds each prediction.
    pub fn with_primary(primary: Arc<dyn WaitTimePredictor>, timeout: Duration) -> Self {
        Self {
            primary: Some(primary),
            fallback: FallbackEstimator,
            timeout,
            slots: Arc::new(Semaphore::new(DEFAULT_MAX_IN_FLIGHT)),
        }
    }

    /// Cap on primary predictions running at once, across all refreshes
    /// sharing this estimator.
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.slots = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Estimate one patient, blocking the caller for at most `timeout`.
    /// The primary runs on a helper thread; a panic there degrades to the
    /// fallback.
    pub fn estimate(&self, request: &PredictionRequest) -> WaitEstimate {
        let Some(primary) = &self.primary else {
            return WaitEstimate::fallback(self.fallback.estimate(request));
        };

        let result = match self.slots.clone().try_acquire_owned() {
            Ok(slot) => predict_on_thread(primary.clone(), request.clone(), self.timeout, slot),
            Err(_) => Err(EstimationError::Unavailable(
                "all prediction slots busy".to_string(),
            )),
        };
        self.resolve(request, primary.name(), result)
    }

    /// Estimate every request, primary calls on the blocking pool. Output
    /// order matches input order.
    pub async fn estimate_all(&self, requests: Vec<PredictionRequest>) -> Vec<WaitEstimate> {
        let Some(primary) = self.primary.clone() else {
            return requests
                .iter()
                .map(|r| WaitEstimate::fallback(self.fallback.estimate(r)))
                .collect();
        };

        let timeout = self.timeout;
        let tasks = requests.into_iter().map(|request| {
            let primary = primary.clone();
            let slots = self.slots.clone();
            async move {
                let result =
                    predict_bounded(primary.clone(), slots, request.clone(), timeout).await;
                self.resolve(&request, primary.name(), result)
            }
        });

        futures_util::future::join_all(tasks).await
    }

    fn resolve(
        &self,
        request: &PredictionRequest,
        predictor: &str,
        result: Result<f64, EstimationError>,
    ) -> WaitEstimate {
        match result {
            Ok(minutes) if !minutes.is_finite() => {
                self.degrade(request, predictor, EstimationError::NonFinite)
            }
            Ok(minutes) if minutes < 0.0 => {
                self.degrade(request, predictor, EstimationError::Negative(minutes))
            }
            Ok(minutes) => WaitEstimate {
                minutes,
                source: EstimateSource::Model,
            },
            Err(e) => self.degrade(request, predictor, e),
        }
    }

    fn degrade(
        &self,
        request: &PredictionRequest,
        predictor: &str,
        error: EstimationError,
    ) -> WaitEstimate {
        tracing::warn!(
            patient_id = %request.patient_id,
            predictor,
            error = %error,
            "Wait-time prediction failed, using fallback"
        );
        WaitEstimate::fallback(self.fallback.estimate(request))
    }
}

/// Run one primary prediction on a dedicated thread and wait at most
/// `timeout`. The slot moves into the thread and frees when the call ends.
fn predict_on_thread(
    primary: Arc<dyn WaitTimePredictor>,
    request: PredictionRequest,
    timeout: Duration,
    slot: OwnedSemaphorePermit,
) -> Result<f64, EstimationError> {
    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("wait-predictor".to_string())
        .spawn(move || {
            let _slot = slot;
            let _ = tx.send(primary.predict(&request));
        })
        .map_err(|e| EstimationError::Failed(e.to_string()))?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(EstimationError::Timeout(timeout.as_millis() as u64)),
        // Sender dropped without a result: the predictor panicked.
        Err(RecvTimeoutError::Disconnected) => Err(EstimationError::Panicked),
    }
}

/// Run one primary prediction on the blocking pool. Waiting for a slot and
/// the prediction itself are each bounded by `timeout`; the slot travels
/// with the blocking job, so a timed-out call still occupies it.
async fn predict_bounded(
    primary: Arc<dyn WaitTimePredictor>,
    slots: Arc<Semaphore>,
    request: PredictionRequest,
    timeout: Duration,
) -> Result<f64, EstimationError> {
    let slot = match tokio::time::timeout(timeout, slots.acquire_owned()).await {
        Ok(Ok(slot)) => slot,
        Ok(Err(_)) => {
            return Err(EstimationError::Unavailable("prediction slots closed".to_string()))
        }
        Err(_) => {
            return Err(EstimationError::Unavailable(
                "all prediction slots busy".to_string(),
            ))
        }
    };

    let task = tokio::task::spawn_blocking(move || {
        let _slot = slot;
        primary.predict(&request)
    });

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) if join_error.is_panic() => Err(EstimationError::Panicked),
        Ok(Err(join_error)) => Err(EstimationError::Failed(join_error.to_string())),
        Err(_) => Err(EstimationError::Timeout(timeout.as_millis() as u64)),
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
