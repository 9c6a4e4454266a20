use std::sync::Arc;

use cashcast_core::Timestamp;
use cashcast_ports::Clock;
use chrono::Duration;
use parking_lot::Mutex;

/// Clock frozen at a given instant until advanced or set
///
/// Cloning shares the underlying time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Move time forward and return the new time
    pub fn advance(&self, by: Duration) -> Timestamp {
        let mut current = self.current.lock();
        *current += by;
        *current
    }

    pub fn set(&self, to: Timestamp) {
        *self.current.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current.lock()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
