//! WebSocket client built on tokio-tungstenite.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{info, trace};

use satori_core::{BoxedWsConnection, TransportError, TransportResult, WsConnection, WsConnector};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Opens WebSocket connections with tokio-tungstenite.
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    /// Creates a new connector.
    pub fn new() -> Self {
        Self
    }
}

impl Default for TungsteniteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WsConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> TransportResult<BoxedWsConnection> {
        info!(url = %url, "Connecting to WebSocket server");

        let (ws_stream, _response) =
            connect_async(url)
                .await
                .map_err(|e| TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: format!("WebSocket connection failed: {}", e),
                })?;
        let (ws_tx, ws_rx) = ws_stream.split();

        info!(url = %url, "WebSocket client connected");

        Ok(Arc::new(TungsteniteConnection {
            url: url.to_string(),
            sink: Mutex::new(ws_tx),
            source: Mutex::new(ws_rx),
        }))
    }
}

/// One open connection. Writers and the reader lock separate halves.
struct TungsteniteConnection {
    url: String,
    sink: Mutex<WsSink>,
    source: Mutex<WsSource>,
}

#[async_trait]
impl WsConnection for TungsteniteConnection {
    async fn send_text(&self, text: String) -> TransportResult<()> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv_text(&self) -> Option<TransportResult<String>> {
        let mut source = self.source.lock().await;
        loop {
            match source.next().await? {
                Ok(Message::Text(text)) => {
                    trace!(url = %self.url, len = text.len(), "Received text");
                    return Some(Ok(text.as_str().to_owned()));
                }
                Ok(Message::Binary(data)) => {
                    trace!(url = %self.url, len = data.len(), "Received binary");
                    return Some(Ok(String::from_utf8_lossy(&data).into_owned()));
                }
                Ok(Message::Ping(data)) => {
                    trace!(url = %self.url, "Received ping, sending pong");
                    let _ = self.sink.lock().await.send(Message::Pong(data)).await;
                }
                Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    info!(url = %self.url, frame = ?frame, "Server closed connection");
                    return None;
                }
                Err(e) => {
                    return Some(Err(TransportError::ConnectionClosed {
                        reason: e.to_string(),
                    }));
                }
            }
        }
    }

    async fn close(&self) -> TransportResult<()> {
        let mut sink = self.sink.lock().await;
        match sink.close().await {
            Ok(()) => Ok(()),
            // Already closed by either side.
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::ConnectionClosed {
                reason: e.to_string(),
            }),
        }
    }
}
