const MIN_OBSERVATIONS: f64 = 10.0;
const OPTIMAL_OBSERVATIONS: f64 = 100.0;

/// Heuristic trust score (0..=95) from the number of observations seen
///
/// Ramps to 30 over the first 10 observations, to 80 at 100, then grows
/// logarithmically and saturates at 95. Not a statistical confidence level.
pub fn model_confidence(observation_count: u64) -> f64 {
    let count = observation_count as f64;
    if count < MIN_OBSERVATIONS {
        count / MIN_OBSERVATIONS * 30.0
    } else if count < OPTIMAL_OBSERVATIONS {
        30.0 + (count - MIN_OBSERVATIONS) / (OPTIMAL_OBSERVATIONS - MIN_OBSERVATIONS) * 50.0
    } else {
        (80.0 + (count / OPTIMAL_OBSERVATIONS).log10() * 10.0).min(95.0)
    }
}
