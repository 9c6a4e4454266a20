use cashcast_core::Timestamp;

/// Port for time abstraction
///
/// Production code uses the wall clock; tests drive a manual clock so that
/// watermarks, snapshot keys and `last_update` are deterministic.
pub trait Clock: Send + Sync {
    /// Get the current time according to this clock
    fn now(&self) -> Timestamp;

    /// Get the clock's name/identifier for debugging
    fn name(&self) -> &str {
        "Clock"
    }
}
