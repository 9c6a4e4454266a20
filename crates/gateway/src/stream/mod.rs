//! Live feed: connection state machine, reconnection and dispatch

mod backoff;
mod client;
mod connector;
mod state;
mod view;
mod ws;

pub use backoff::ReconnectBackoff;
pub use client::{FeedEvent, StreamHandle, StreamSettings, StreamingClient};
pub use connector::{FeedConnection, FeedConnector, FeedInbound, FeedPeer};
pub use state::ConnectionState;
pub use view::FeedView;
pub use ws::WsConnector;
