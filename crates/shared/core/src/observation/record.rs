use serde::{Deserialize, Serialize};

use crate::values::Timestamp;

/// One scraped cashback rate, as returned by the history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub store_id: String,
    #[serde(default)]
    pub store_name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, alias = "main_rate_numeric")]
    pub main_rate: Option<f64>,
    #[serde(default, alias = "category_rate_numeric")]
    pub category_rate: Option<f64>,
    #[serde(default)]
    pub is_upsized: bool,
    pub scraped_at: Timestamp,
}

impl RateRecord {
    /// Effective rate: the main rate, else the category rate, else 0
    ///
    /// A zero main rate counts as missing.
    pub fn rate(&self) -> f64 {
        self.main_rate
            .filter(|rate| *rate != 0.0)
            .or(self.category_rate)
            .unwrap_or(0.0)
    }
}

/// A single rate change, as seen by the update engine
///
/// Absent fields carry no information and leave the matching sub-model
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time_since_last_change_days: Option<f64>,
    pub magnitude_of_change: Option<f64>,
    pub was_upsized: Option<bool>,
    pub timestamp: Timestamp,
    pub store_id: String,
}

impl Observation {
    /// An observation with no information, to be filled field by field
    pub fn empty(store_id: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            time_since_last_change_days: None,
            magnitude_of_change: None,
            was_upsized: None,
            timestamp,
            store_id: store_id.into(),
        }
    }

    pub fn with_interval(mut self, days: f64) -> Self {
        self.time_since_last_change_days = Some(days);
        self
    }

    pub fn with_magnitude(mut self, change: f64) -> Self {
        self.magnitude_of_change = Some(change);
        self
    }

    pub fn with_upsized(mut self, upsized: bool) -> Self {
        self.was_upsized = Some(upsized);
        self
    }
}
