use std::time::Duration;

/// Exponential reconnect delay: `min(base * multiplier^attempt, max)`
///
/// `attempt` counts consecutive failures since the last successful
/// connection.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    multiplier: f64,
    max: Duration,
    attempt: u32,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 1.5, Duration::from_secs(30))
    }
}

impl ReconnectBackoff {
    pub fn new(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            base,
            multiplier: multiplier.max(1.0),
            max,
            attempt: 0,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay for a given attempt, without touching the counter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max.as_secs_f64()))
    }

    /// Delay before the next retry; escalates the counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Back to the base delay after a successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
