use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StreamError;
use crate::messages::FeedMessage;

const INBOUND_BUFFER: usize = 1024;
const OUTBOUND_BUFFER: usize = 32;
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// What the transport hands up to the streaming client
#[derive(Debug, Clone, PartialEq)]
pub enum FeedInbound {
    Message(FeedMessage),
    /// Text frame that did not parse as a feed message
    Malformed(String),
    /// Peer closed the connection
    Closed,
    Error(String),
}

/// Port for opening a live feed connection
#[async_trait]
pub trait FeedConnector: Send + Sync {
    async fn connect(&self) -> Result<FeedConnection, StreamError>;
}

/// Client side of an open connection
///
/// Dropping it stops the transport: the writer sees its channel close and
/// the reader task is aborted.
pub struct FeedConnection {
    outbound: Option<mpsc::Sender<FeedMessage>>,
    inbound: mpsc::Receiver<FeedInbound>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

/// Transport side of an open connection
pub struct FeedPeer {
    pub inbound: mpsc::Sender<FeedInbound>,
    pub outbound: mpsc::Receiver<FeedMessage>,
}

impl FeedConnection {
    /// Linked client/transport ends
    pub fn pair() -> (FeedConnection, FeedPeer) {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);
        (
            FeedConnection {
                outbound: Some(out_tx),
                inbound: in_rx,
                writer: None,
                reader: None,
            },
            FeedPeer {
                inbound: in_tx,
                outbound: out_rx,
            },
        )
    }

    /// Attach the transport tasks serving this connection
    pub fn with_tasks(mut self, writer: JoinHandle<()>, reader: JoinHandle<()>) -> Self {
        self.writer = Some(writer);
        self.reader = Some(reader);
        self
    }

    pub async fn recv(&mut self) -> Option<FeedInbound> {
        self.inbound.recv().await
    }

    pub async fn send(&self, message: FeedMessage) -> Result<(), StreamError> {
        let outbound = self.outbound.as_ref().ok_or(StreamError::ChannelClosed)?;
        outbound
            .send(message)
            .await
            .map_err(|_| StreamError::ChannelClosed)
    }

    /// Close gracefully: let the writer flush and send its close frame
    pub async fn close(mut self) {
        self.outbound.take();
        if let Some(writer) = self.writer.take() {
            let _ = tokio::time::timeout(CLOSE_GRACE, writer).await;
        }
    }
}

impl Drop for FeedConnection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}
