//! Checks new records against the model's own predictions

use cashcast_core::{ModelState, PredictionEngine, RateRecord};
use serde::Serialize;

pub const DEFAULT_SIGMA_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MIN_UPSIZE_PCT: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Anomaly {
    /// Record rate further than the threshold (in std devs) from the
    /// expected change
    UnusualRate {
        store_id: String,
        store_name: Option<String>,
        rate: f64,
        expected: f64,
        deviation: f64,
    },
    /// Upsize observed while the model considered it unlikely
    UnexpectedUpsize {
        store_id: String,
        store_name: Option<String>,
        probability_pct: f64,
    },
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    predictor: PredictionEngine,
    sigma_threshold: f64,
    min_upsize_pct: f64,
}

impl AnomalyDetector {
    pub fn new(predictor: PredictionEngine) -> Self {
        Self {
            predictor,
            sigma_threshold: DEFAULT_SIGMA_THRESHOLD,
            min_upsize_pct: DEFAULT_MIN_UPSIZE_PCT,
        }
    }

    pub fn with_thresholds(mut self, sigma_threshold: f64, min_upsize_pct: f64) -> Self {
        self.sigma_threshold = sigma_threshold;
        self.min_upsize_pct = min_upsize_pct;
        self
    }

    /// Flag records that contradict `state`
    ///
    /// The rate check is skipped while the magnitude variance is undefined.
    pub fn detect(&self, state: &ModelState, records: &[RateRecord]) -> Vec<Anomaly> {
        let magnitude = self.predictor.predict_magnitude(state).ok();
        let upsize = self.predictor.predict_upsize_probability(state);

        let mut anomalies = Vec::new();
        for record in records {
            let rate = record.rate();

            if let Some(magnitude) = &magnitude {
                let deviation = (rate - magnitude.expected_change).abs();
                if deviation > magnitude.std_dev * self.sigma_threshold {
                    anomalies.push(Anomaly::UnusualRate {
                        store_id: record.store_id.clone(),
                        store_name: record.store_name.clone(),
                        rate,
                        expected: magnitude.expected_change,
                        deviation,
                    });
                }
            }

            if record.is_upsized && upsize.probability_pct < self.min_upsize_pct {
                anomalies.push(Anomaly::UnexpectedUpsize {
                    store_id: record.store_id.clone(),
                    store_name: record.store_name.clone(),
                    probability_pct: upsize.probability_pct,
                });
            }
        }
        anomalies
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(PredictionEngine::default())
    }
}
