//! Advisory health checks on a model

use std::fmt;

use cashcast_core::{ModelState, PredictionEngine, model_confidence};
use serde::Serialize;

const MIN_OBSERVATIONS: u64 = 10;
const MAX_ABS_MAGNITUDE: f64 = 100.0;
const MIN_CONFIDENCE: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum ValidationIssue {
    InsufficientObservations { count: u64 },
    NegativeExpectedTime { days: f64 },
    UnrealisticMagnitude { expected_change: f64 },
    MagnitudeUndefined,
    LowConfidence { confidence: f64 },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::InsufficientObservations { count } => write!(
                f,
                "insufficient observations for reliable predictions ({count} < {MIN_OBSERVATIONS})"
            ),
            ValidationIssue::NegativeExpectedTime { days } => {
                write!(f, "invalid time prediction ({days} days)")
            }
            ValidationIssue::UnrealisticMagnitude { expected_change } => {
                write!(f, "unrealistic magnitude prediction ({expected_change})")
            }
            ValidationIssue::MagnitudeUndefined => {
                write!(f, "magnitude variance undefined")
            }
            ValidationIssue::LowConfidence { confidence } => {
                write!(f, "model confidence too low ({confidence:.1})")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub confidence: f64,
}

/// Check a model for conditions that make its predictions untrustworthy
pub fn validate(state: &ModelState, predictor: &PredictionEngine) -> ValidationReport {
    let mut errors = Vec::new();
    let count = state.observation_count();
    if count < MIN_OBSERVATIONS {
        errors.push(ValidationIssue::InsufficientObservations { count });
    }

    let expected_days = 1.0 / state.time().expected_rate();
    if expected_days < 0.0 {
        errors.push(ValidationIssue::NegativeExpectedTime {
            days: expected_days,
        });
    }

    match predictor.predict_magnitude(state) {
        Ok(magnitude) if magnitude.expected_change.abs() > MAX_ABS_MAGNITUDE => {
            errors.push(ValidationIssue::UnrealisticMagnitude {
                expected_change: magnitude.expected_change,
            });
        }
        Ok(_) => {}
        Err(_) => errors.push(ValidationIssue::MagnitudeUndefined),
    }

    let confidence = model_confidence(count);
    if confidence < MIN_CONFIDENCE {
        errors.push(ValidationIssue::LowConfidence { confidence });
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        confidence,
    }
}
