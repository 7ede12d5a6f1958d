//! HTTP client built on reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use tracing::trace;

use satori_core::{HttpClient, HttpRequest, HttpResponse, TransportError, TransportResult};

/// JSON POST client shared by every bot of an adapter.
#[derive(Clone)]
pub struct ReqwestClient {
    client: Client,
}

impl ReqwestClient {
    /// Creates a client with a 30 second timeout.
    pub fn new() -> TransportResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
        let mut req = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await.map_err(|e| TransportError::ConnectionFailed {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;

        trace!(url = %request.url, status, len = body.len(), "HTTP POST finished");
        Ok(HttpResponse { status, body })
    }
}
