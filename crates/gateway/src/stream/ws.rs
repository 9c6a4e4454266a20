use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::connector::{FeedConnection, FeedConnector, FeedInbound, FeedPeer};
use crate::error::StreamError;
use crate::messages::FeedMessage;

/// WebSocket transport for the live feed
///
/// Each connection is served by a writer task (JSON text frames out) and a
/// reader task (text frames parsed into [`FeedMessage`]s).
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        WsConnector { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FeedConnector for WsConnector {
    async fn connect(&self) -> Result<FeedConnection, StreamError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        let (connection, peer) = FeedConnection::pair();
        let FeedPeer {
            inbound,
            mut outbound,
        } = peer;

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound.recv().await {
                let json = match serde_json::to_string(&message) {
                    Ok(j) => j,
                    Err(e) => {
                        log::warn!("Dropping unserializable feed message: {}", e);
                        continue;
                    }
                };

                if let Err(e) = write.send(Message::Text(json.into())).await {
                    log::warn!("Feed write failed: {}", e);
                    break;
                }
            }
            let _ = write.send(Message::Close(None)).await;
        });

        let reader = tokio::spawn(async move {
            while let Some(frame) = read.next().await {
                let event = match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<FeedMessage>(&text) {
                        Ok(message) => FeedInbound::Message(message),
                        Err(e) => FeedInbound::Malformed(format!("{e}: {}", text.as_str())),
                    },
                    Ok(Message::Close(frame)) => {
                        log::debug!("Feed closed by peer: {:?}", frame);
                        let _ = inbound.send(FeedInbound::Closed).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let _ = inbound.send(FeedInbound::Error(e.to_string())).await;
                        return;
                    }
                };

                if inbound.send(event).await.is_err() {
                    return;
                }
            }
            let _ = inbound.send(FeedInbound::Closed).await;
        });

        Ok(connection.with_tasks(writer, reader))
    }
}
