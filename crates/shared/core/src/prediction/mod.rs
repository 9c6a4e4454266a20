//! Predictive queries over a [`crate::ModelState`]

mod accuracy;
mod confidence;
mod engine;
mod types;

pub use accuracy::{ActualOutcome, PredictionAccuracy};
pub use confidence::model_confidence;
pub use engine::PredictionEngine;
pub use types::{
    Interval, MagnitudePrediction, ModelSummary, NextChangePrediction, PredictionConfig,
    QuantileForecast, UpsizePrediction, WindowProbability,
};
