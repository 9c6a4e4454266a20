use chrono::{DateTime, Utc};

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Identifier of a tracked entity (a store, or a live feed)
pub type EntityId = String;

/// Entity id of the model trained across every store
pub const GLOBAL_ENTITY: &str = "global";

/// Milliseconds in one day, used to turn timestamp deltas into day fractions
pub const MILLIS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// Elapsed time between two timestamps, in (fractional) days
pub fn days_between(earlier: Timestamp, later: Timestamp) -> f64 {
    (later - earlier).num_milliseconds() as f64 / MILLIS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_days_between() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(days_between(t0, t0 + Duration::days(3)), 3.0);
        assert_eq!(days_between(t0, t0 + Duration::hours(12)), 0.5);
        assert!(days_between(t0 + Duration::days(1), t0) < 0.0);
    }
}
