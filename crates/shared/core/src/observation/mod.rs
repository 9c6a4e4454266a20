//! Observations: what the update engine consumes
//!
//! Batch mode turns stored [`RateRecord`]s into observations with
//! [`ObservationExtractor`]; streaming mode builds them one close at a time
//! with [`StreamObservationBuilder`].

mod extractor;
mod record;
mod stream;

pub use extractor::{DEFAULT_CATEGORY, ObservationExtractor};
pub use record::{Observation, RateRecord};
pub use stream::StreamObservationBuilder;

/// Rate differences at or below this are treated as noise
pub const DEAD_BAND: f64 = 0.01;

/// Floor applied to the waiting time between two changes (days)
pub const MIN_INTERVAL_DAYS: f64 = 0.1;
