use serde::{Deserialize, Serialize};

use super::types::ModelSummary;

/// What actually happened after a prediction was made
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActualOutcome {
    pub days_until_change: f64,
    pub magnitude_change: f64,
}

/// Percent scores (0..=100) of a prediction against its outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionAccuracy {
    pub time_accuracy: f64,
    /// Zero when the summary had no magnitude prediction
    pub magnitude_accuracy: f64,
    pub overall_accuracy: f64,
}

impl PredictionAccuracy {
    pub fn score(summary: &ModelSummary, actual: &ActualOutcome) -> Self {
        let time_accuracy =
            relative_accuracy(summary.next_change.expected_days, actual.days_until_change);
        let magnitude_accuracy = summary
            .magnitude
            .map(|m| relative_accuracy(m.expected_change, actual.magnitude_change))
            .unwrap_or(0.0);

        Self {
            time_accuracy,
            magnitude_accuracy,
            overall_accuracy: (time_accuracy + magnitude_accuracy) / 2.0,
        }
    }
}

/// `max(0, 100 - |predicted - actual| / |actual| * 100)`
///
/// An actual value of zero scores 100 only on an exact hit.
fn relative_accuracy(predicted: f64, actual: f64) -> f64 {
    let diff = (predicted - actual).abs();
    if actual == 0.0 {
        return if diff == 0.0 { 100.0 } else { 0.0 };
    }
    let score = 100.0 - diff / actual.abs() * 100.0;
    if score.is_nan() { 0.0 } else { score.max(0.0) }
}
