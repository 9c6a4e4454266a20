use std::collections::BTreeMap;

use super::record::{Observation, RateRecord};
use super::{DEAD_BAND, MIN_INTERVAL_DAYS};
use crate::values::days_between;

/// Category key for records without a category
pub const DEFAULT_CATEGORY: &str = "main";

/// Turns historical rate records into change observations
///
/// Records are grouped per (store, category) and walked in time order; each
/// consecutive pair whose rate moved by more than the dead band becomes one
/// observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservationExtractor {
    dead_band: f64,
    min_interval_days: f64,
}

impl Default for ObservationExtractor {
    fn default() -> Self {
        Self {
            dead_band: DEAD_BAND,
            min_interval_days: MIN_INTERVAL_DAYS,
        }
    }
}

impl ObservationExtractor {
    pub fn new(dead_band: f64, min_interval_days: f64) -> Self {
        Self {
            dead_band,
            min_interval_days,
        }
    }

    pub fn extract(&self, records: &[RateRecord]) -> Vec<Observation> {
        let mut groups: BTreeMap<(&str, &str), Vec<&RateRecord>> = BTreeMap::new();
        for record in records {
            let category = record
                .category
                .as_deref()
                .filter(|category| !category.is_empty())
                .unwrap_or(DEFAULT_CATEGORY);
            groups
                .entry((record.store_id.as_str(), category))
                .or_default()
                .push(record);
        }

        let mut observations = Vec::new();
        for group in groups.values_mut() {
            group.sort_by_key(|record| record.scraped_at);

            for pair in group.windows(2) {
                let (previous, current) = (pair[0], pair[1]);
                let rate_diff = current.rate() - previous.rate();
                if rate_diff.abs() <= self.dead_band {
                    continue;
                }

                let days = days_between(previous.scraped_at, current.scraped_at)
                    .max(self.min_interval_days);
                observations.push(
                    Observation::empty(current.store_id.clone(), current.scraped_at)
                        .with_interval(days)
                        .with_magnitude(rate_diff)
                        .with_upsized(current.is_upsized),
                );
            }
        }
        observations
    }
}
