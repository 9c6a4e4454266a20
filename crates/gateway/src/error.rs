//! Error types for the gateway crate

use cashcast_ports::FetchError;
use thiserror::Error;

/// REST-level errors
#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convert infrastructure RestError to port FetchError
impl From<RestError> for FetchError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) if e.is_timeout() => FetchError::Timeout,
            RestError::Http(e) => FetchError::Network(e.to_string()),
            RestError::Url(e) => FetchError::Network(e.to_string()),
            RestError::Status { status, body } => FetchError::Status {
                status,
                message: body,
            },
            RestError::Parse(msg) => FetchError::Decode(msg),
        }
    }
}

/// Live feed errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Channel closed")]
    ChannelClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::Connection(err.to_string())
    }
}
