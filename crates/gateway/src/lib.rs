//! Cashcast Gateway
//!
//! Everything that talks to the rate/feed backend:
//! - [`RestClient`]: request/response endpoints (history, model sync, feed REST)
//! - [`StreamingClient`]: long-lived live feed with heartbeat monitoring and
//!   exponential-backoff reconnection
//!
//! ## Architecture
//!
//! ```text
//!   Backend ──HTTP──► RestClient ──► HistorySource / ModelSyncSink ports
//!      │
//!      └─────WS────► FeedConnector ──► StreamingClient ──► FeedEvent channel
//!                    (WsConnector)          │
//!                                           └──► FeedView (latest price, candles,
//!                                                predictions, model state)
//! ```

pub mod error;
pub mod messages;
pub mod rest_client;
pub mod stream;

// Re-export commonly used types
pub use error::{RestError, StreamError};
pub use messages::{
    Candle, CandlesResponse, CurrentPriceResponse, FeedMessage, HorizonPrediction,
    NextCandlePrediction, Predictions,
};
pub use rest_client::RestClient;
pub use stream::{
    ConnectionState, FeedConnection, FeedConnector, FeedEvent, FeedInbound, FeedPeer, FeedView,
    ReconnectBackoff, StreamHandle, StreamSettings, StreamingClient, WsConnector,
};
