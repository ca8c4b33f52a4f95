use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::allocator::NursePolicy;
use crate::queue::priority::PriorityWeights;
use crate::queue::QueueError;

/// Application-level constants
pub const APP_NAME: &str = "PatientFlow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Env var overriding the wait-time model weights file.
pub const MODEL_PATH_ENV: &str = "PATIENT_FLOW_MODEL_PATH";

/// Env var overriding the per-prediction timeout (milliseconds).
pub const PREDICTION_TIMEOUT_ENV: &str = "PATIENT_FLOW_PREDICTION_TIMEOUT_MS";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "patient_flow=debug,info"
    } else {
        "patient_flow=info,warn"
    }
}

/// Get the application data directory (~/PatientFlow/)
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Get the models directory (wait-time regression weights)
pub fn models_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("models"))
}

/// Resolve the wait-time model weights file.
///
/// Priority:
/// 1. `PATIENT_FLOW_MODEL_PATH` env var
/// 2. `model_path` from the loaded config
/// 3. `~/PatientFlow/models/wait_model.json` if it exists
///
/// `None` means the deterministic fallback estimator runs alone.
pub fn resolve_model_path(config: &QueueConfig) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(MODEL_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    if let Some(path) = &config.model_path {
        return Some(path.clone());
    }

    models_dir()
        .map(|dir| dir.join("wait_model.json"))
        .filter(|path| path.exists())
}

/// Which patient statuses take part in a queue refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionPolicy {
    /// Only `waiting` patients.
    WaitingOnly,
    /// `waiting` and `in-progress` patients.
    WaitingAndInProgress,
}

/// Tunable queue policy. Every field has a default so partial JSON files work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub weights: PriorityWeights,
    pub nurse_policy: NursePolicy,
    pub inclusion: InclusionPolicy,
    /// Upper bound for a single model prediction (milliseconds).
    pub prediction_timeout_ms: u64,
    /// Maximum predictions in flight during a concurrent refresh.
    pub max_concurrent_predictions: usize,
    /// Seconds between timer-driven refreshes.
    pub refresh_interval_secs: u64,
    pub model_path: Option<PathBuf>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            weights: PriorityWeights::default(),
            nurse_policy: NursePolicy::BestEffort,
            inclusion: InclusionPolicy::WaitingOnly,
            prediction_timeout_ms: 250,
            max_concurrent_predictions: 8,
            refresh_interval_secs: 60,
            model_path: None,
        }
    }
}

impl QueueConfig {
    /// Load a config file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, QueueError> {
        let raw = std::fs::read_to_string(path)?;
        let config: QueueConfig = serde_json::from_str(&raw)?;
        Ok(config.with_env_overrides())
    }

    /// Apply `PATIENT_FLOW_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(raw) = std::env::var(PREDICTION_TIMEOUT_ENV) {
            match raw.parse::<u64>() {
                Ok(ms) => self.prediction_timeout_ms = ms,
                Err(_) => tracing::warn!(
                    value = %raw,
                    "Ignoring invalid {PREDICTION_TIMEOUT_ENV}"
                ),
            }
        }
        self
    }

    pub fn prediction_timeout(&self) -> Duration {
        Duration::from_millis(self.prediction_timeout_ms.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_data_dir_under_home() {
        let Some(dir) = app_data_dir() else {
            return;
        };
        let home = dirs::home_dir().unwrap();
        assert!(dir.starts_with(home));
        assert!(dir.ends_with("PatientFlow"));
    }

    #[test]
    fn models_dir_under_app_data() {
        let (Some(models), Some(app)) = (models_dir(), app_data_dir()) else {
            return;
        };
        assert!(models.starts_with(app));
        assert!(models.ends_with("models"));
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.6.0");
    }

    #[test]
    fn defaults_preserve_nurse_quirk() {
        let config = QueueConfig::default();
        assert_eq!(config.nurse_policy, NursePolicy::BestEffort);
        assert_eq!(config.inclusion, InclusionPolicy::WaitingOnly);
        assert_eq!(config.prediction_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(
            &path,
            r#"{"nurse_policy": "required", "refresh_interval_secs": 30}"#,
        )
        .unwrap();

        let config = QueueConfig::load(&path).unwrap();
        assert_eq!(config.nurse_policy, NursePolicy::Required);
        assert_eq!(config.refresh_interval(), Duration::from_secs(30));
        assert_eq!(config.weights, PriorityWeights::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(QueueConfig::load(&path), Err(QueueError::Json(_))));
    }

    #[test]
    fn explicit_model_path_is_used() {
        let config = QueueConfig {
            model_path: Some(PathBuf::from("/tmp/weights.json")),
            ..QueueConfig::default()
        };
        if std::env::var(MODEL_PATH_ENV).is_err() {
            assert_eq!(
                resolve_model_path(&config),
                Some(PathBuf::from("/tmp/weights.json"))
            );
        }
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = QueueConfig {
            prediction_timeout_ms: 0,
            ..QueueConfig::default()
        };
        assert_eq!(config.prediction_timeout(), Duration::from_millis(1));
    }
}
