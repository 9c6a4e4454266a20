use std::path::Path;

use thiserror::Error;
use url::Url;

use super::types::{CashcastConfig, StorageBackend};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid URL for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },
    #[error("Invalid {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CashcastConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<CashcastConfig, ConfigError> {
    let config: CashcastConfig = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<CashcastConfig, ConfigError> {
    let default_config = include_str!("cashcast_config.json");
    load_config_from_str(default_config)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl CashcastConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api.base_url).map_err(|source| ConfigError::InvalidUrl {
            field: "api.base_url",
            source,
        })?;
        if self.api.feed.trim().is_empty() {
            return Err(invalid("api.feed", "must not be empty"));
        }
        if self.api.timeout_ms == 0 {
            return Err(invalid("api.timeout_ms", "must be > 0"));
        }

        if self.stream.enabled {
            let url = Url::parse(&self.stream.url).map_err(|source| ConfigError::InvalidUrl {
                field: "stream.url",
                source,
            })?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(invalid("stream.url", format!("unsupported scheme '{}'", url.scheme())));
            }
            for (field, value) in [
                ("stream.health_check_interval_ms", self.stream.health_check_interval_ms),
                ("stream.stale_after_ms", self.stream.stale_after_ms),
                ("stream.backoff_base_ms", self.stream.backoff_base_ms),
                ("stream.backoff_max_ms", self.stream.backoff_max_ms),
            ] {
                if value == 0 {
                    return Err(invalid(field, "must be > 0"));
                }
            }
            if self.stream.backoff_multiplier < 1.0 {
                return Err(invalid("stream.backoff_multiplier", "must be >= 1"));
            }
            if self.stream.backoff_max_ms < self.stream.backoff_base_ms {
                return Err(invalid("stream.backoff_max_ms", "must be >= backoff_base_ms"));
            }
            if self.stream.candle_window == 0 {
                return Err(invalid("stream.candle_window", "must be > 0"));
            }
        }

        if self.orchestrator.history_limit == 0 || self.orchestrator.resync_history_limit == 0 {
            return Err(invalid("orchestrator.history_limit", "must be > 0"));
        }
        if self.orchestrator.event_capacity == 0 {
            return Err(invalid("orchestrator.event_capacity", "must be > 0"));
        }

        let model = &self.model;
        if !(model.dead_band.is_finite() && model.dead_band >= 0.0) {
            return Err(invalid("model.dead_band", "must be >= 0"));
        }
        if !(model.min_interval_days.is_finite() && model.min_interval_days > 0.0) {
            return Err(invalid("model.min_interval_days", "must be > 0"));
        }
        if !(model.anomaly_sigma_threshold.is_finite() && model.anomaly_sigma_threshold > 0.0) {
            return Err(invalid("model.anomaly_sigma_threshold", "must be > 0"));
        }
        if !(0.0..=100.0).contains(&model.anomaly_min_upsize_pct) {
            return Err(invalid("model.anomaly_min_upsize_pct", "must be within 0..=100"));
        }
        model
            .priors
            .check()
            .map_err(|e| invalid("model.priors", e.to_string()))?;

        if self.storage.max_snapshots == 0 {
            return Err(invalid("storage.max_snapshots", "must be > 0"));
        }
        if self.storage.backend == StorageBackend::File
            && self.storage.directory.as_os_str().is_empty()
        {
            return Err(invalid("storage.directory", "required for the file backend"));
        }
        Ok(())
    }
}
