use std::fmt;

/// Lifecycle of the live feed connection
///
/// ```text
/// Disconnected ──► Connecting ──► Connected ──► Disconnected (failure, will retry)
///      ▲               │              │
///      └───────────────┘              └──────► Closing (disconnect requested)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
        };
        f.write_str(name)
    }
}
