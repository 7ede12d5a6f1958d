//! Serve-mode orchestration.
//!
//! The runtime owns the loaded configuration and the transports. Running it
//! with a [`Dispatcher`] builds one [`SatoriAdapter`] per `[[satori]]` entry
//! and serves it according to `serve`:
//!
//! | Mode | Per endpoint |
//! |------|--------------|
//! | `websocket` | a [`SatoriConnection`] dispatching events |
//! | `dev` | a [`SatoriConnection`] forwarding payloads to `webhook_client` |
//! | `webhook` | a webhook listener, plus `login.get` for configured accounts |
//!
//! ```rust,ignore
//! let runtime = SatoriRuntime::builder().config_file("satori.toml").build()?;
//! let dispatcher = runtime
//!     .dispatcher()
//!     .plugin(echo_plugin())
//!     .build();
//! runtime.run(dispatcher).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::signal;
use tracing::{error, info, warn};

use satori_adapter::{
    ConnectionHandle, ConnectionPhase, EventSink, SatoriAdapter, SatoriConnection, ServeMode,
};
use satori_core::{ListenerHandle, TransportContext};
use satori_framework::{Dispatcher, DispatcherBuilder};

use crate::config::{ConfigLoader, ConfigResult, SatoriConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Loads configuration, initializes logging and serves the bots.
pub struct SatoriRuntime {
    config: SatoriConfig,
    transports: TransportContext,
}

impl SatoriRuntime {
    /// Loads the configuration from the current directory.
    ///
    /// Falls back to defaults when loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: failed to load configuration ({e}), using defaults");
                SatoriConfig::default()
            });
        Self::from_config(config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime with every transport compiled in.
    pub fn from_config(config: SatoriConfig) -> Self {
        logging::init_from_config(&config.logging);
        info!(
            serve = ?config.serve,
            endpoints = config.satori.len(),
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );
        Self {
            config,
            transports: default_transports(),
        }
    }

    /// Replaces the transports, e.g. with in-memory ones.
    pub fn with_transports(mut self, transports: TransportContext) -> Self {
        self.transports = transports;
        self
    }

    pub fn config(&self) -> &SatoriConfig {
        &self.config
    }

    /// A dispatcher builder using `data_dir` and `[dispatch]`.
    pub fn dispatcher(&self) -> DispatcherBuilder {
        Dispatcher::builder()
            .data_dir(&self.config.data_dir)
            .max_concurrency(self.config.dispatch.max_concurrency)
    }

    /// Serves until Ctrl+C or SIGTERM.
    pub async fn run(&self, dispatcher: Dispatcher) -> RuntimeResult<()> {
        info!("Satori runtime is running. Press Ctrl+C to stop.");
        self.run_until(dispatcher, wait_for_shutdown()).await
    }

    /// Serves until `shutdown` completes or every connection has ended.
    ///
    /// Returns the first connection error, e.g. a spent retry budget.
    pub async fn run_until<F>(&self, dispatcher: Dispatcher, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        let served = self.start(&dispatcher).await;
        let (connections, listeners) = match served {
            Ok(served) => served,
            Err(e) => {
                dispatcher.shutdown();
                return Err(e);
            }
        };

        let mut phases: Vec<_> = connections.iter().map(ConnectionHandle::subscribe).collect();
        let all_closed = async {
            if phases.is_empty() {
                return futures::future::pending::<()>().await;
            }
            join_all(phases.iter_mut().map(|phase| async move {
                let _ = phase.wait_for(|p| *p == ConnectionPhase::Closed).await;
            }))
            .await;
        };

        tokio::select! {
            _ = shutdown => info!("Shutting down"),
            _ = all_closed => warn!("Every connection has closed"),
        }

        for listener in listeners {
            listener.stop();
        }
        let mut first_error = None;
        for result in join_all(connections.into_iter().map(ConnectionHandle::shutdown)).await {
            if let Err(e) = result {
                error!(error = %e, "Connection ended with an error");
                first_error.get_or_insert(e);
            }
        }
        dispatcher.shutdown();
        info!("Runtime stopped");

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn start(
        &self,
        dispatcher: &Dispatcher,
    ) -> RuntimeResult<(Vec<ConnectionHandle>, Vec<ListenerHandle>)> {
        if self.config.satori.is_empty() {
            return Err(RuntimeError::NoEndpoint);
        }

        let serve = self.config.serve;
        let sink: Arc<dyn EventSink> = Arc::new(dispatcher.clone());
        let http = self.transports.http_client()?;
        let mut connections = Vec::new();
        let mut listeners = Vec::new();

        for endpoint in &self.config.satori {
            let config = endpoint.resolve(serve, &self.config.host_id)?;
            let adapter = Arc::new(SatoriAdapter::new(config, http.clone(), sink.clone()));

            match serve {
                ServeMode::WebSocket | ServeMode::Dev => {
                    let connector = self.transports.ws_connector()?;
                    info!(url = %adapter.config().events_url(), mode = ?serve, "Starting connection");
                    connections.push(SatoriConnection::new(adapter, connector).spawn());
                }
                ServeMode::WebHook => {
                    let server = self.transports.http_server()?;
                    let Some(section) = &endpoint.webhook_server else {
                        continue;
                    };
                    listeners.push(
                        server
                            .listen(&section.listen, &section.listen_path, adapter.clone())
                            .await?,
                    );
                    adapter.verify_accounts().await;
                }
            }
        }
        Ok((connections, listeners))
    }
}

impl Default for SatoriRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(unused_mut)]
fn default_transports() -> TransportContext {
    let mut transports = TransportContext::new();

    #[cfg(feature = "ws-client")]
    {
        transports =
            transports.with_ws_connector(Arc::new(satori_transport::TungsteniteConnector::new()));
    }

    #[cfg(feature = "http-client")]
    {
        match satori_transport::ReqwestClient::new() {
            Ok(client) => transports = transports.with_http_client(Arc::new(client)),
            Err(e) => error!(error = %e, "Failed to build the HTTP client"),
        }
    }

    #[cfg(feature = "http-server")]
    {
        transports = transports.with_http_server(Arc::new(satori_transport::AxumServer::new()));
    }

    transports
}

/// Waits for Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                let _ = signal::ctrl_c().await;
                info!("Received Ctrl+C");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C");
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builds a [`SatoriRuntime`] from a customized [`ConfigLoader`].
pub struct RuntimeBuilder {
    loader: ConfigLoader,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    pub fn merge(mut self, config: SatoriConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    pub fn build(self) -> ConfigResult<SatoriRuntime> {
        Ok(SatoriRuntime::from_config(self.loader.load()?))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use satori_core::{
        BoxedWsConnection, HttpClient, HttpRequest, HttpResponse, TransportError,
        TransportResult, WsConnection, WsConnector,
    };

    use super::*;
    use crate::config::{SatoriEndpoint, WebSocketSection};

    struct NoHttp;

    #[async_trait]
    impl HttpClient for NoHttp {
        async fn post_json(&self, _request: HttpRequest) -> TransportResult<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                body: "[]".into(),
            })
        }
    }

    /// Serves one Ready frame per connection, then stays silent.
    struct QuietConnection {
        frames: Mutex<VecDeque<String>>,
    }

    #[async_trait]
    impl WsConnection for QuietConnection {
        async fn send_text(&self, _text: String) -> TransportResult<()> {
            Ok(())
        }

        async fn recv_text(&self) -> Option<TransportResult<String>> {
            let next = self.frames.lock().pop_front();
            match next {
                Some(frame) => Some(Ok(frame)),
                None => futures::future::pending().await,
            }
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    struct QuietConnector;

    #[async_trait]
    impl WsConnector for QuietConnector {
        async fn connect(&self, _url: &str) -> TransportResult<BoxedWsConnection> {
            Ok(Arc::new(QuietConnection {
                frames: Mutex::new(VecDeque::from([r#"{"op":4,"body":{"logins":[]}}"#.to_string()])),
            }))
        }
    }

    struct RefusingConnector;

    #[async_trait]
    impl WsConnector for RefusingConnector {
        async fn connect(&self, url: &str) -> TransportResult<BoxedWsConnection> {
            Err(TransportError::ConnectionFailed {
                url: url.to_string(),
                reason: "refused".into(),
            })
        }
    }

    fn config() -> SatoriConfig {
        SatoriConfig {
            host_id: "owner".into(),
            satori: vec![SatoriEndpoint {
                version: 1,
                reconnect_delay: 1,
                websocket: Some(WebSocketSection {
                    ip: "127.0.0.1".into(),
                    port: 5140,
                    path: String::new(),
                    token: None,
                    heartbeat_interval: 1,
                }),
                webhook_server: None,
                webhook_client: None,
            }],
            ..Default::default()
        }
    }

    fn runtime(config: SatoriConfig, connector: Arc<dyn WsConnector>) -> SatoriRuntime {
        SatoriRuntime::from_config(config).with_transports(
            TransportContext::new()
                .with_http_client(Arc::new(NoHttp))
                .with_ws_connector(connector),
        )
    }

    fn dispatcher(runtime: &SatoriRuntime, dir: &tempfile::TempDir) -> Dispatcher {
        runtime.dispatcher().data_dir(dir.path()).build()
    }

    #[tokio::test]
    async fn test_no_endpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(SatoriConfig::default(), Arc::new(QuietConnector));
        let result = runtime
            .run_until(dispatcher(&runtime, &dir), async {})
            .await;
        assert!(matches!(result, Err(RuntimeError::NoEndpoint)));
    }

    #[tokio::test]
    async fn test_missing_transport_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = SatoriRuntime::from_config(config()).with_transports(TransportContext::new());
        let result = runtime
            .run_until(dispatcher(&runtime, &dir), async {})
            .await;
        assert!(matches!(
            result,
            Err(RuntimeError::Transport(TransportError::NotAvailable { .. }))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_connections() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(config(), Arc::new(QuietConnector));
        let result = runtime
            .run_until(
                dispatcher(&runtime, &dir),
                tokio::time::sleep(Duration::from_secs(3)),
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spent_retry_budget_stops_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = runtime(config(), Arc::new(RefusingConnector));
        let result = runtime
            .run_until(dispatcher(&runtime, &dir), futures::future::pending())
            .await;
        assert!(matches!(
            result,
            Err(RuntimeError::Adapter(satori_core::AdapterError::RetryExhausted { .. }))
        ));
    }
}
