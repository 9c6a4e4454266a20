use thiserror::Error;

/// Errors from a key-value backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors from a remote endpoint (history fetch, model sync)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Request timed out")]
    Timeout,
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
