//! Transport seams.
//!
//! The adapter talks to the network only through the traits in this module.
//! Concrete implementations live in `satori-transport`; tests drive the
//! connection state machine with in-memory implementations instead.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

// =============================================================================
// WebSocket
// =============================================================================

/// An open, full-duplex text connection.
///
/// All methods take `&self` so the heartbeat task and the read loop can use
/// the same connection concurrently.
#[async_trait]
pub trait WsConnection: Send + Sync {
    /// Sends one text frame.
    async fn send_text(&self, text: String) -> TransportResult<()>;

    /// Waits for the next text frame.
    ///
    /// Returns `None` once the peer closed the connection.
    async fn recv_text(&self) -> Option<TransportResult<String>>;

    /// Closes the connection. Closing twice is not an error.
    async fn close(&self) -> TransportResult<()>;
}

/// Shared handle to an open WebSocket connection.
pub type BoxedWsConnection = Arc<dyn WsConnection>;

/// Opens WebSocket connections.
#[async_trait]
pub trait WsConnector: Send + Sync {
    /// Connects to `url`.
    async fn connect(&self, url: &str) -> TransportResult<BoxedWsConnection>;
}

// =============================================================================
// HTTP client
// =============================================================================

/// An outbound JSON POST request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Absolute URL.
    pub url: String,
    /// Extra headers (name, value).
    pub headers: Vec<(String, String)>,
    /// JSON body.
    pub body: Value,
}

impl HttpRequest {
    /// Creates a request with no extra headers.
    pub fn new(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// The status and raw body of an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Sends JSON POST requests. Must be safe for concurrent use.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Posts `request` and returns the response regardless of its status.
    async fn post_json(&self, request: HttpRequest) -> TransportResult<HttpResponse>;
}

// =============================================================================
// HTTP server
// =============================================================================

/// Receives the body of every POST delivered to a webhook listener.
#[async_trait]
pub trait PayloadHandler: Send + Sync {
    /// Handles one payload. An error turns into a 400 response.
    async fn handle_payload(&self, body: &[u8]) -> TransportResult<()>;
}

/// Starts webhook listeners.
#[async_trait]
pub trait HttpServer: Send + Sync {
    /// Listens on `addr` and routes `POST path` to `handler`.
    async fn listen(
        &self,
        addr: &str,
        path: &str,
        handler: Arc<dyn PayloadHandler>,
    ) -> TransportResult<ListenerHandle>;
}

/// Handle to a running listener. Dropping it stops the listener.
#[derive(Debug)]
pub struct ListenerHandle {
    /// Unique identifier for this listener.
    pub id: String,
    /// Shutdown signal sender.
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl ListenerHandle {
    /// Creates a new listener handle.
    pub fn new(id: impl Into<String>, shutdown_tx: tokio::sync::oneshot::Sender<()>) -> Self {
        Self {
            id: id.into(),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Stops the listener.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// TransportContext
// =============================================================================

/// The set of transports available to an adapter.
#[derive(Clone, Default)]
pub struct TransportContext {
    ws_connector: Option<Arc<dyn WsConnector>>,
    http_client: Option<Arc<dyn HttpClient>>,
    http_server: Option<Arc<dyn HttpServer>>,
}

impl TransportContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the WebSocket connector.
    pub fn with_ws_connector(mut self, connector: Arc<dyn WsConnector>) -> Self {
        self.ws_connector = Some(connector);
        self
    }

    /// Registers the HTTP client.
    pub fn with_http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Registers the HTTP server.
    pub fn with_http_server(mut self, server: Arc<dyn HttpServer>) -> Self {
        self.http_server = Some(server);
        self
    }

    /// Returns the WebSocket connector.
    pub fn ws_connector(&self) -> TransportResult<Arc<dyn WsConnector>> {
        self.ws_connector
            .clone()
            .ok_or(TransportError::NotAvailable {
                transport: "ws-client",
            })
    }

    /// Returns the HTTP client.
    pub fn http_client(&self) -> TransportResult<Arc<dyn HttpClient>> {
        self.http_client
            .clone()
            .ok_or(TransportError::NotAvailable {
                transport: "http-client",
            })
    }

    /// Returns the HTTP server.
    pub fn http_server(&self) -> TransportResult<Arc<dyn HttpServer>> {
        self.http_server
            .clone()
            .ok_or(TransportError::NotAvailable {
                transport: "http-server",
            })
    }
}

impl std::fmt::Debug for TransportContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportContext")
            .field("ws_connector", &self.ws_connector.is_some())
            .field("http_client", &self.http_client.is_some())
            .field("http_server", &self.http_server.is_some())
            .finish()
    }
}
