//! Webhook listener built on axum.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Bytes,
    extract::{ConnectInfo, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use tracing::{error, info, trace, warn};

use satori_core::{HttpServer, ListenerHandle, PayloadHandler, TransportResult};

/// HTTP server that forwards every POST body to a [`PayloadHandler`].
pub struct AxumServer;

impl AxumServer {
    /// Creates a new server factory.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AxumServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for the HTTP server.
struct ServerState {
    handler: Arc<dyn PayloadHandler>,
}

#[async_trait]
impl HttpServer for AxumServer {
    async fn listen(
        &self,
        addr: &str,
        path: &str,
        handler: Arc<dyn PayloadHandler>,
    ) -> TransportResult<ListenerHandle> {
        let state = Arc::new(ServerState { handler });

        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };

        let router = Router::new()
            .route(&path, post(webhook_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;

        info!(addr = %actual_addr, path = %path, "Webhook server listening");

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            );

            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "Webhook server error");
                    }
                }
                _ = &mut shutdown_rx => {
                    info!("Webhook server shutting down");
                }
            }
        });

        Ok(ListenerHandle::new(
            format!("webhook-{}", actual_addr),
            shutdown_tx,
        ))
    }
}

/// HTTP POST handler.
async fn webhook_handler(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> impl IntoResponse {
    trace!(remote_addr = %addr, len = body.len(), "Received webhook POST");

    match state.handler.handle_payload(&body).await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(remote_addr = %addr, error = %e, "Rejected webhook payload");
            (StatusCode::BAD_REQUEST, "bad payload")
        }
    }
}
