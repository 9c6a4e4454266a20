//! Cashcast Core Domain
//!
//! Pure Bayesian model for tracking how a cashback rate changes over time.
//! This crate contains no async, no I/O, and is 100% unit testable.
//!
//! ## Sub-models
//!
//! ```text
//!                    ┌──────────────────────────┐
//!   RateRecord[] ──► │   ObservationExtractor   │
//!                    └────────────┬─────────────┘
//!                                 │ Observation
//!                                 ▼
//!                    ┌──────────────────────────┐
//!                    │  BayesianUpdateEngine    │
//!                    └────────────┬─────────────┘
//!                                 │ mutates
//!                                 ▼
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ ModelState                                              │
//!   │   time      : GammaBelief              (Gamma-Exp)      │
//!   │   magnitude : NormalInverseGammaBelief (NIG-Normal)     │
//!   │   upsize    : BetaBelief               (Beta-Bernoulli) │
//!   └────────────────────────────┬────────────────────────────┘
//!                                │ read
//!                                ▼
//!                    ┌──────────────────────────┐
//!                    │    PredictionEngine      │
//!                    └──────────────────────────┘
//! ```

pub mod engine;
pub mod error;
pub mod math;
pub mod model;
pub mod observation;
pub mod prediction;
pub mod values;

// Re-export commonly used types at crate root
pub use engine::BayesianUpdateEngine;
pub use error::{CoreError, Result};
pub use math::{GammaCdfMethod, gamma_cdf, gamma_quantile};
pub use model::{
    BetaBelief, GammaBelief, ModelPriors, ModelSnapshot, ModelState, NormalInverseGammaBelief,
    Posteriors,
};
pub use observation::{
    DEAD_BAND, MIN_INTERVAL_DAYS, Observation, ObservationExtractor, RateRecord,
    StreamObservationBuilder,
};
pub use prediction::{
    ActualOutcome, Interval, MagnitudePrediction, ModelSummary, NextChangePrediction,
    PredictionAccuracy, PredictionConfig, PredictionEngine, QuantileForecast, UpsizePrediction,
    WindowProbability, model_confidence,
};
pub use values::{EntityId, GLOBAL_ENTITY, Timestamp};
