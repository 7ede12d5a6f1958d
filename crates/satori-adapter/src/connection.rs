//! WebSocket connection state machine.
//!
//! One [`SatoriConnection`] keeps one gateway session alive:
//!
//! ```text
//! Disconnected ─► Connecting ─► Identifying ─► Ready ◄─► Degraded
//!       ▲                                        │
//!       └──────────── Reconnecting ◄─────────────┘
//!                          │ budget spent / manual close
//!                          ▼
//!                        Closed
//! ```
//!
//! - After connecting, an Identify frame carries the token and the last seen
//!   event id so the gateway can replay missed events.
//! - A heartbeat task pings every `heartbeat_interval` seconds. Five
//!   consecutive ping failures close the socket and end the session, even
//!   when the peer never answers the close.
//! - Every lost session costs one unit of the retry budget (5). The budget is
//!   never refilled, reaching Ready included; once it drops below zero the
//!   connection is abandoned.
//! - [`ConnectionHandle::close`] is the manual close: no reconnect follows.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use satori_core::{AdapterError, AdapterResult, BoxedWsConnection, WsConnector};

use crate::adapter::SatoriAdapter;
use crate::model::signal::{IdentifyBody, Opcode, Signal};

/// Reconnect attempts allowed before the connection is abandoned.
pub const RETRY_BUDGET: i32 = 5;

/// Consecutive ping failures that force a reconnect.
pub const MAX_HEARTBEAT_FAILURES: u32 = 5;

/// Observable phase of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Disconnected,
    Connecting,
    Identifying,
    Ready,
    /// Ready, but the last heartbeat failed.
    Degraded,
    Reconnecting,
    /// Terminal.
    Closed,
}

/// How a session ended.
enum SessionEnd {
    ManualClose,
    Lost(String),
}

/// Drives one WebSocket session of a [`SatoriAdapter`].
pub struct SatoriConnection {
    adapter: Arc<SatoriAdapter>,
    connector: Arc<dyn WsConnector>,
    phase: Arc<watch::Sender<ConnectionPhase>>,
    shutdown: Arc<watch::Sender<bool>>,
    retry_budget: i32,
    reconnect_delay: Duration,
    heartbeat_interval: Duration,
}

impl SatoriConnection {
    /// Creates a connection using the adapter's configured timings.
    pub fn new(adapter: Arc<SatoriAdapter>, connector: Arc<dyn WsConnector>) -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Disconnected);
        let (shutdown, _) = watch::channel(false);
        let reconnect_delay = adapter.config().reconnect();
        let heartbeat_interval = adapter.config().heartbeat();
        Self {
            adapter,
            connector,
            phase: Arc::new(phase),
            shutdown: Arc::new(shutdown),
            retry_budget: RETRY_BUDGET,
            reconnect_delay,
            heartbeat_interval,
        }
    }

    /// Overrides the retry budget.
    pub fn with_retry_budget(mut self, budget: i32) -> Self {
        self.retry_budget = budget;
        self
    }

    /// Returns a handle without starting the connection.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            phase: self.phase.subscribe(),
            shutdown: Arc::clone(&self.shutdown),
            task: None,
        }
    }

    /// Runs the connection on a new task.
    pub fn spawn(self) -> ConnectionHandle {
        let mut handle = self.handle();
        handle.task = Some(tokio::spawn(self.run()));
        handle
    }

    /// Runs until the connection is closed manually or the retry budget is
    /// spent.
    pub async fn run(self) -> AdapterResult<()> {
        let url = self.adapter.config().events_url();
        let mut budget = self.retry_budget;

        loop {
            if self.closing() {
                return self.finish();
            }

            self.set_phase(ConnectionPhase::Connecting);
            info!(url = %url, "Connecting to Satori gateway");

            match self.session(&url).await {
                SessionEnd::ManualClose => return self.finish(),
                SessionEnd::Lost(reason) => {
                    warn!(url = %url, reason = %reason, "Disconnected from Satori gateway");
                }
            }

            self.set_phase(ConnectionPhase::Reconnecting);
            budget -= 1;
            if budget < 0 {
                warn!(url = %url, "Connection to Satori gateway timed out");
                self.set_phase(ConnectionPhase::Closed);
                return Err(AdapterError::RetryExhausted {
                    attempts: self.retry_budget.max(0) as u32,
                });
            }

            debug!(delay = ?self.reconnect_delay, "Waiting before reconnecting");
            let mut shutdown = self.shutdown.subscribe();
            tokio::select! {
                _ = sleep(self.reconnect_delay) => {}
                _ = closed(&mut shutdown) => {}
            }
            if self.closing() {
                return self.finish();
            }
            info!(remaining = budget, "Reconnecting to Satori gateway");
        }
    }

    /// One connect / identify / read cycle.
    async fn session(&self, url: &str) -> SessionEnd {
        let conn = match self.connector.connect(url).await {
            Ok(conn) => conn,
            Err(e) => return SessionEnd::Lost(e.to_string()),
        };

        self.set_phase(ConnectionPhase::Identifying);
        let identify = Signal::Identify(IdentifyBody {
            token: self.adapter.config().token.clone(),
            sequence: Some(self.adapter.sequence().unwrap_or(0)),
        });
        if let Err(e) = conn.send_text(identify.encode()).await {
            error!(error = %e, "Failed to send identify frame");
            let _ = conn.close().await;
            return SessionEnd::Lost(e.to_string());
        }

        let mut heartbeat = tokio::spawn(heartbeat(
            Arc::clone(&conn),
            self.heartbeat_interval,
            Arc::clone(&self.phase),
        ));

        let end = self.read_loop(&conn, &mut heartbeat).await;
        heartbeat.abort();
        let _ = conn.close().await;
        end
    }

    async fn read_loop(
        &self,
        conn: &BoxedWsConnection,
        heartbeat: &mut JoinHandle<()>,
    ) -> SessionEnd {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                frame = conn.recv_text() => match frame {
                    Some(Ok(text)) => {
                        if self.adapter.handle_signal(&text).await == Some(Opcode::Ready) {
                            self.set_phase(ConnectionPhase::Ready);
                        }
                    }
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                    None => return SessionEnd::Lost("closed by peer".to_string()),
                },
                _ = &mut *heartbeat => return SessionEnd::Lost("heartbeat failed".to_string()),
                _ = closed(&mut shutdown) => return SessionEnd::ManualClose,
            }
        }
    }

    fn closing(&self) -> bool {
        *self.shutdown.borrow()
    }

    fn finish(&self) -> AdapterResult<()> {
        info!("Connection to Satori gateway closed");
        self.set_phase(ConnectionPhase::Closed);
        Ok(())
    }

    fn set_phase(&self, phase: ConnectionPhase) {
        self.phase.send_replace(phase);
    }
}

/// Resolves once a manual close was requested.
async fn closed(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

/// Pings the gateway. Returns only after too many consecutive failures; the
/// session aborts it otherwise.
async fn heartbeat(
    conn: BoxedWsConnection,
    interval: Duration,
    phase: Arc<watch::Sender<ConnectionPhase>>,
) {
    let ping = Signal::Ping.encode();
    let mut failures = 0u32;

    loop {
        sleep(interval).await;

        match conn.send_text(ping.clone()).await {
            Ok(()) => {
                if failures > 0 {
                    phase.send_replace(ConnectionPhase::Ready);
                }
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                warn!(failures, error = %e, "Heartbeat failed");
                phase.send_replace(ConnectionPhase::Degraded);
                if failures >= MAX_HEARTBEAT_FAILURES {
                    warn!("Too many heartbeat failures, closing connection");
                    let _ = conn.close().await;
                    return;
                }
            }
        }
    }
}

/// Handle to a running connection.
pub struct ConnectionHandle {
    phase: watch::Receiver<ConnectionPhase>,
    shutdown: Arc<watch::Sender<bool>>,
    task: Option<JoinHandle<AdapterResult<()>>>,
}

impl ConnectionHandle {
    /// Current phase.
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// Receiver notified on every phase change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionPhase> {
        self.phase.clone()
    }

    /// Requests a manual close. No reconnect follows.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Waits for the connection task to finish.
    pub async fn join(mut self) -> AdapterResult<()> {
        match self.task.take() {
            Some(task) => task
                .await
                .map_err(|e| AdapterError::Internal(format!("connection task failed: {e}")))?,
            None => Ok(()),
        }
    }

    /// Closes the connection and waits for it to finish.
    pub async fn shutdown(self) -> AdapterResult<()> {
        self.close();
        self.join().await
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("phase", &self.phase())
            .field("closing", &*self.shutdown.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    use satori_core::{TransportError, TransportResult, WsConnection};

    use crate::adapter::tests::{message_frame, ready_frame, test_adapter};
    use crate::bot::tests::MockHttp;
    use crate::config::ServeMode;

    struct MockConnection {
        incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
        sent: Mutex<Vec<String>>,
    }

    impl MockConnection {
        fn new() -> (Arc<Self>, mpsc::UnboundedSender<String>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn = Arc::new(Self {
                incoming: tokio::sync::Mutex::new(rx),
                sent: Mutex::new(Vec::new()),
            });
            (conn, tx)
        }

        fn sent(&self) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .map(|text| serde_json::from_str(text).unwrap())
                .collect()
        }
    }

    #[async_trait]
    impl WsConnection for MockConnection {
        async fn send_text(&self, text: String) -> TransportResult<()> {
            self.sent.lock().push(text);
            Ok(())
        }

        async fn recv_text(&self) -> Option<TransportResult<String>> {
            self.incoming.lock().await.recv().await.map(Ok)
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    /// Accepts the identify frame, fails every ping and never yields a frame.
    #[derive(Default)]
    struct HalfOpenConnection {
        pings: AtomicUsize,
    }

    #[async_trait]
    impl WsConnection for HalfOpenConnection {
        async fn send_text(&self, text: String) -> TransportResult<()> {
            let frame: Value = serde_json::from_str(&text).unwrap();
            if frame["op"] == 1 {
                self.pings.fetch_add(1, Ordering::SeqCst);
                return Err(TransportError::SendFailed("broken pipe".to_string()));
            }
            Ok(())
        }

        async fn recv_text(&self) -> Option<TransportResult<String>> {
            std::future::pending().await
        }

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }
    }

    /// Hands out queued connections, then refuses.
    #[derive(Default)]
    struct MockConnector {
        queue: Mutex<VecDeque<BoxedWsConnection>>,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl WsConnector for MockConnector {
        async fn connect(&self, url: &str) -> TransportResult<BoxedWsConnection> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.queue.lock().pop_front() {
                Some(conn) => Ok(conn),
                None => Err(TransportError::ConnectionFailed {
                    url: url.to_string(),
                    reason: "refused".to_string(),
                }),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let (adapter, _sink) = test_adapter(ServeMode::WebSocket, MockHttp::new(200, ""));
        let connector = Arc::new(MockConnector::default());
        let connection = SatoriConnection::new(adapter, connector.clone());
        let handle = connection.handle();

        let result = connection.run().await;

        assert!(matches!(
            result,
            Err(AdapterError::RetryExhausted { attempts: 5 })
        ));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 6);
        assert_eq!(handle.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identify_ready_and_manual_close() {
        let (adapter, sink) = test_adapter(ServeMode::WebSocket, MockHttp::new(200, ""));
        let (conn, tx) = MockConnection::new();
        let connector = Arc::new(MockConnector::default());
        connector.queue.lock().push_back(conn.clone());

        let handle = SatoriConnection::new(adapter.clone(), connector.clone()).spawn();
        tx.send(ready_frame("b1", "discord")).unwrap();

        let mut phase = handle.subscribe();
        phase
            .wait_for(|p| *p == ConnectionPhase::Ready)
            .await
            .unwrap();
        assert!(adapter.registry().contains("b1"));
        assert_eq!(*sink.ready.lock(), vec!["b1".to_string()]);

        let identify = &conn.sent()[0];
        assert_eq!(identify["op"], 3);
        assert_eq!(identify["body"]["token"], "secret");
        assert_eq!(identify["body"]["sequence"], 0);

        // Let a few heartbeats go out.
        sleep(Duration::from_secs(11)).await;
        assert!(conn.sent().iter().skip(1).all(|frame| frame["op"] == 1));
        assert!(conn.sent().len() >= 3);

        assert_ok!(handle.shutdown().await);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_carries_sequence() {
        let (adapter, sink) = test_adapter(ServeMode::WebSocket, MockHttp::new(200, ""));
        let (first, first_tx) = MockConnection::new();
        let (second, _second_tx) = MockConnection::new();
        let connector = Arc::new(MockConnector::default());
        connector.queue.lock().push_back(first);
        connector.queue.lock().push_back(second.clone());

        let handle = SatoriConnection::new(adapter, connector.clone()).spawn();
        first_tx.send(ready_frame("b1", "discord")).unwrap();
        first_tx
            .send(message_frame(7, "b1", "message-created"))
            .unwrap();
        drop(first_tx);

        while second.sent().is_empty() {
            sleep(Duration::from_millis(100)).await;
        }

        let identify = &second.sent()[0];
        assert_eq!(identify["op"], 3);
        assert_eq!(identify["body"]["sequence"], 7);
        assert_eq!(sink.events.lock().len(), 1);

        assert_ok!(handle.shutdown().await);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_failures_force_reconnect() {
        let (adapter, _sink) = test_adapter(ServeMode::WebSocket, MockHttp::new(200, ""));
        let conn = Arc::new(HalfOpenConnection::default());
        let connector = Arc::new(MockConnector::default());
        connector.queue.lock().push_back(conn.clone());

        let connection = SatoriConnection::new(adapter, connector.clone()).with_retry_budget(1);
        let mut phase = connection.handle().subscribe();
        let handle = connection.spawn();

        phase
            .wait_for(|p| *p == ConnectionPhase::Degraded)
            .await
            .unwrap();
        phase
            .wait_for(|p| *p == ConnectionPhase::Reconnecting)
            .await
            .unwrap();
        assert_eq!(
            conn.pings.load(Ordering::SeqCst),
            MAX_HEARTBEAT_FAILURES as usize
        );

        let result = handle.join().await;
        assert!(matches!(
            result,
            Err(AdapterError::RetryExhausted { attempts: 1 })
        ));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_does_not_refill_retry_budget() {
        let (adapter, _sink) = test_adapter(ServeMode::WebSocket, MockHttp::new(200, ""));
        let connector = Arc::new(MockConnector::default());
        for _ in 0..3 {
            let (conn, tx) = MockConnection::new();
            tx.send(ready_frame("b1", "discord")).unwrap();
            connector.queue.lock().push_back(conn);
        }

        let result = SatoriConnection::new(adapter, connector.clone())
            .with_retry_budget(2)
            .run()
            .await;

        assert!(matches!(
            result,
            Err(AdapterError::RetryExhausted { attempts: 2 })
        ));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
        assert!(connector.queue.lock().is_empty());
    }
}
