use std::path::PathBuf;
use std::time::Duration;

use cashcast_core::{DEAD_BAND, MIN_INTERVAL_DAYS, ModelPriors, ObservationExtractor};
use cashcast_gateway::StreamSettings;
use cashcast_orchestrator::{DEFAULT_MIN_UPSIZE_PCT, DEFAULT_SIGMA_THRESHOLD, OrchestratorSettings};
use serde::{Deserialize, Serialize};

/// Root of the JSON configuration file
///
/// Every section and field is optional; missing values take the defaults
/// of the corresponding `Default` impl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashcastConfig {
    pub api: ApiConfig,
    pub stream: StreamConfig,
    pub orchestrator: OrchestratorConfig,
    pub model: ModelConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// REST backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Feed name used in feed REST paths and as the live model's entity id
    pub feed: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001/api/".to_string(),
            feed: "eth".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Live feed connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub enabled: bool,
    pub url: String,
    pub health_check_interval_ms: u64,
    pub stale_after_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_ms: u64,
    pub candle_window: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "ws://localhost:8001/ws/eth/kalman-updates".to_string(),
            health_check_interval_ms: 10_000,
            stale_after_ms: 60_000,
            backoff_base_ms: 5_000,
            backoff_multiplier: 1.5,
            backoff_max_ms: 30_000,
            candle_window: 100,
        }
    }
}

impl StreamConfig {
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            health_check_interval: Duration::from_millis(self.health_check_interval_ms),
            stale_after: Duration::from_millis(self.stale_after_ms),
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_multiplier: self.backoff_multiplier,
            backoff_max: Duration::from_millis(self.backoff_max_ms),
            candle_window: self.candle_window,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Poll the history endpoint on a timer
    pub auto_update: bool,
    /// Polling interval; values under one minute are raised to one minute
    pub update_interval_ms: u64,
    pub history_limit: usize,
    pub resync_history_limit: usize,
    pub detect_anomalies: bool,
    /// Register the REST backend as the model sync sink
    pub sync_enabled: bool,
    pub sync_after_update: bool,
    pub event_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let settings = OrchestratorSettings::default();
        Self {
            auto_update: true,
            update_interval_ms: settings.update_interval.as_millis() as u64,
            history_limit: settings.history_limit,
            resync_history_limit: settings.resync_history_limit,
            detect_anomalies: settings.detect_anomalies,
            sync_enabled: false,
            sync_after_update: settings.sync_after_update,
            event_capacity: settings.event_capacity,
        }
    }
}

impl OrchestratorConfig {
    pub fn settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            update_interval: Duration::from_millis(self.update_interval_ms),
            history_limit: self.history_limit,
            resync_history_limit: self.resync_history_limit,
            detect_anomalies: self.detect_anomalies,
            sync_after_update: self.sync_enabled && self.sync_after_update,
            event_capacity: self.event_capacity,
        }
    }
}

/// Observation thresholds, anomaly sensitivity and starting priors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Rate moves at or below this are treated as noise
    pub dead_band: f64,
    /// Floor for the interval between two changes, in days
    pub min_interval_days: f64,
    /// Distance from the expected change, in std devs, that counts as unusual
    pub anomaly_sigma_threshold: f64,
    /// Upsizes seen below this probability (percent) are flagged
    pub anomaly_min_upsize_pct: f64,
    pub priors: ModelPriors,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dead_band: DEAD_BAND,
            min_interval_days: MIN_INTERVAL_DAYS,
            anomaly_sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            anomaly_min_upsize_pct: DEFAULT_MIN_UPSIZE_PCT,
            priors: ModelPriors::default(),
        }
    }
}

impl ModelConfig {
    pub fn extractor(&self) -> ObservationExtractor {
        ObservationExtractor::new(self.dead_band, self.min_interval_days)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Snapshot directory for the file backend
    pub directory: PathBuf,
    pub max_snapshots: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            directory: PathBuf::from("./data/models"),
            max_snapshots: cashcast_store::DEFAULT_MAX_SNAPSHOTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
