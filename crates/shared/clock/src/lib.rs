//! Cashcast Clocks
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: time that only moves when told to, for tests and replays

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use cashcast_ports::Clock;
