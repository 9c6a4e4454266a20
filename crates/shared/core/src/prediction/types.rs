use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result, ensure_positive};
use crate::math::GammaCdfMethod;
use crate::model::Posteriors;
use crate::values::Timestamp;

fn default_horizons() -> Vec<u32> {
    vec![7, 14, 30]
}

fn default_quantile_levels() -> Vec<f64> {
    vec![0.5, 0.75, 0.95]
}

fn default_quantile_upper() -> f64 {
    crate::math::DEFAULT_QUANTILE_UPPER
}

fn default_quantile_tolerance() -> f64 {
    crate::math::DEFAULT_QUANTILE_TOLERANCE
}

/// Tuning of the prediction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default)]
    pub cdf_method: GammaCdfMethod,

    /// Windows (days) for "changes within N days" probabilities
    #[serde(default = "default_horizons")]
    pub horizons_days: Vec<u32>,

    /// Probability levels reported as waiting-time quantiles
    #[serde(default = "default_quantile_levels")]
    pub quantile_levels: Vec<f64>,

    /// Upper end of the bisection bracket (days)
    #[serde(default = "default_quantile_upper")]
    pub quantile_upper_days: f64,

    /// Bracket width at which bisection stops (days)
    #[serde(default = "default_quantile_tolerance")]
    pub quantile_tolerance_days: f64,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            cdf_method: GammaCdfMethod::default(),
            horizons_days: default_horizons(),
            quantile_levels: default_quantile_levels(),
            quantile_upper_days: default_quantile_upper(),
            quantile_tolerance_days: default_quantile_tolerance(),
        }
    }
}

impl PredictionConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self
            .quantile_levels
            .iter()
            .find(|level| !(0.0..=1.0).contains(*level))
        {
            return Err(CoreError::InvalidProbability(*level));
        }
        ensure_positive("quantile_upper_days", self.quantile_upper_days)?;
        ensure_positive("quantile_tolerance_days", self.quantile_tolerance_days)?;
        Ok(())
    }
}

/// Closed interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    pub fn centered(center: f64, half_width: f64) -> Self {
        Self {
            lower: center - half_width,
            upper: center + half_width,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Waiting time (days) below which the next change falls with probability `level`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantileForecast {
    pub level: f64,
    pub days: f64,
}

/// Probability (0..=1) that the next change happens within `within_days`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowProbability {
    pub within_days: u32,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextChangePrediction {
    /// Posterior mean of the change rate (changes per day)
    pub expected_rate: f64,
    pub expected_days: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub quantiles: Vec<QuantileForecast>,
    pub probabilities: Vec<WindowProbability>,
    pub predicted_date: Timestamp,
}

impl NextChangePrediction {
    pub fn quantile(&self, level: f64) -> Option<f64> {
        self.quantiles
            .iter()
            .find(|q| (q.level - level).abs() < 1e-9)
            .map(|q| q.days)
    }

    pub fn probability_within(&self, days: u32) -> Option<f64> {
        self.probabilities
            .iter()
            .find(|w| w.within_days == days)
            .map(|w| w.probability)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudePrediction {
    pub expected_change: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub ci95: Interval,
}

/// Upsize probability and the trust in it, both in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpsizePrediction {
    pub probability_pct: f64,
    pub confidence_pct: f64,
}

/// Everything the model currently believes, in one value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummary {
    pub observation_count: u64,
    pub last_update: Timestamp,
    pub next_change: NextChangePrediction,
    /// Absent while the magnitude variance is undefined
    pub magnitude: Option<MagnitudePrediction>,
    pub upsize: UpsizePrediction,
    pub posteriors: Posteriors,
    pub model_confidence: f64,
}
