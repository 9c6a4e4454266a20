use super::record::Observation;
use super::{DEAD_BAND, MIN_INTERVAL_DAYS};
use crate::values::{Timestamp, days_between};

/// Builds observations from a live sequence of closing values
///
/// Each close is compared with the previous one; a move beyond the dead band
/// yields an observation whose interval runs from the last emitted change.
/// Live candles carry no upsize flag, so `was_upsized` stays absent.
#[derive(Debug, Clone)]
pub struct StreamObservationBuilder {
    entity: String,
    dead_band: f64,
    min_interval_days: f64,
    last_close: Option<f64>,
    last_change_at: Option<Timestamp>,
}

impl StreamObservationBuilder {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            dead_band: DEAD_BAND,
            min_interval_days: MIN_INTERVAL_DAYS,
            last_close: None,
            last_change_at: None,
        }
    }

    pub fn with_dead_band(mut self, dead_band: f64) -> Self {
        self.dead_band = dead_band;
        self
    }

    pub fn with_min_interval_days(mut self, min_interval_days: f64) -> Self {
        self.min_interval_days = min_interval_days;
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Reset the reference value, e.g. from an `initial` snapshot
    pub fn seed(&mut self, close: f64, at: Timestamp) {
        if close.is_finite() {
            self.last_close = Some(close);
            self.last_change_at = Some(at);
        }
    }

    /// Feed the next close; returns an observation if it moved enough
    pub fn observe_close(&mut self, close: f64, at: Timestamp) -> Option<Observation> {
        if !close.is_finite() {
            return None;
        }
        let Some(previous) = self.last_close.replace(close) else {
            self.last_change_at = Some(at);
            return None;
        };

        let change = close - previous;
        if change.abs() <= self.dead_band {
            return None;
        }

        let since = self.last_change_at.replace(at).unwrap_or(at);
        let days = days_between(since, at).max(self.min_interval_days);
        Some(
            Observation::empty(self.entity.clone(), at)
                .with_interval(days)
                .with_magnitude(change),
        )
    }
}
