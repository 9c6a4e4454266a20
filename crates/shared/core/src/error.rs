//! Core domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A belief parameter that must be strictly positive was not
    #[error("Invalid {name}: {value} (must be finite and > 0)")]
    InvalidParameter { name: &'static str, value: f64 },

    /// Predictive variance of the magnitude model needs alpha > 1
    #[error("Magnitude variance undefined for alpha={alpha} (requires alpha > 1)")]
    UndefinedVariance { alpha: f64 },

    /// Probability argument outside [0, 1]
    #[error("Probability out of range: {0}")]
    InvalidProbability(f64),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Check that a parameter is finite and strictly positive
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CoreError::InvalidParameter { name, value })
    }
}
