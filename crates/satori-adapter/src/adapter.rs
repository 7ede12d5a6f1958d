//! Satori adapter: frame handling shared by every serve mode.
//!
//! The adapter turns raw signaling payloads into registry updates and
//! dispatched events. It is transport agnostic: the WebSocket connection
//! feeds it through [`SatoriAdapter::handle_signal`], the webhook server
//! through [`SatoriAdapter::handle_webhook`].
//!
//! ```text
//! payload ──► qq filter ──► (Dev: forward to webhook)
//!                 │
//!                 ▼
//!             Signal::decode
//!   ┌────────┬────┴─────┬──────────┐
//!  Event    Pong      Ready     other
//!   │                   │
//!   │ login-*: registry │ register logins
//!   │ others: sink      │
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use satori_core::{
    AdapterError, AdapterResult, DecodeError, DecodeResult, HttpClient, HttpRequest,
    PayloadHandler, TransportError, TransportResult,
};

use crate::bot::SatoriBot;
use crate::config::{AdapterConfig, ServeMode};
use crate::model::event::{Event, EventKind};
use crate::model::signal::{EventBody, Opcode, Signal};
use crate::model::types::{Login, User};
use crate::registry::BotRegistry;
use crate::traits::EventSink;

/// Name used as the log prefix of connected bots.
pub const ADAPTER_NAME: &str = "Satori";

/// Platform whose traffic is ignored entirely.
const IGNORED_PLATFORM: &str = "qq";

/// The Satori protocol adapter.
pub struct SatoriAdapter {
    config: Arc<AdapterConfig>,
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn EventSink>,
    registry: Arc<BotRegistry>,
    /// Id of the last event seen, sent back on Identify to resume.
    sequence: Mutex<Option<i64>>,
}

impl SatoriAdapter {
    /// Creates an adapter with an empty registry.
    pub fn new(
        config: AdapterConfig,
        http: Arc<dyn HttpClient>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            http,
            sink,
            registry: Arc::new(BotRegistry::new()),
            sequence: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Arc<AdapterConfig> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BotRegistry> {
        &self.registry
    }

    /// Last event id seen on any transport.
    pub fn sequence(&self) -> Option<i64> {
        *self.sequence.lock()
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Handles one WebSocket text frame.
    ///
    /// Returns the op code of the frame when it was handled locally. Decode
    /// failures are logged and the frame is dropped.
    pub async fn handle_signal(&self, text: &str) -> Option<Opcode> {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                return None;
            }
        };

        if is_ignored(&value) {
            trace!("Dropping frame from ignored platform");
            return None;
        }

        if self.config.mode == ServeMode::Dev {
            self.forward(value).await;
            return None;
        }

        match self.handle_value(value, false).await {
            Ok(op) => Some(op),
            Err(e) => {
                warn!(error = %e, "Dropping frame");
                None
            }
        }
    }

    /// Handles one webhook body.
    ///
    /// Events from bots that are not registered yet trigger a `login.get`
    /// verification first.
    pub async fn handle_webhook(&self, body: &[u8]) -> AdapterResult<()> {
        let value: Value = serde_json::from_slice(body).map_err(DecodeError::from)?;
        if is_ignored(&value) {
            trace!("Dropping webhook payload from ignored platform");
            return Ok(());
        }
        self.handle_value(value, true).await?;
        Ok(())
    }

    /// Verifies every configured webhook account.
    ///
    /// Failures are logged; the account is verified again by its first event.
    pub async fn verify_accounts(&self) {
        for account in &self.config.accounts {
            if let Err(e) = self.verify(&account.id, &account.platform).await {
                warn!(
                    self_id = %account.id,
                    platform = %account.platform,
                    error = %e,
                    "Bot verification failed"
                );
            }
        }
    }

    // =========================================================================
    // Classification
    // =========================================================================

    async fn handle_value(&self, value: Value, verify: bool) -> DecodeResult<Opcode> {
        let signal = Signal::from_value(value)?;
        let op = signal.opcode();
        match signal {
            Signal::Event(body) => self.handle_event(*body, verify).await?,
            Signal::Pong => trace!("Received pong"),
            Signal::Ready(body) => self.connect_logins(body.logins).await,
            Signal::Ping | Signal::Identify(_) => {
                debug!(op = op as i64, "Ignoring client-side signal from gateway")
            }
        }
        Ok(op)
    }

    async fn handle_event(&self, body: EventBody, verify: bool) -> DecodeResult<()> {
        let event = Event::decode(body)?;
        *self.sequence.lock() = Some(event.id);

        if event.login().is_some() {
            self.handle_login(&event).await;
            return Ok(());
        }

        let bot = match self.registry.get(&event.self_id) {
            Some(bot) => bot,
            None if verify => match self.verify(&event.self_id, &event.platform).await {
                Ok(bot) => bot,
                Err(e) => {
                    warn!(self_id = %event.self_id, error = %e, "Bot verification failed");
                    return Ok(());
                }
            },
            None => {
                debug!(
                    self_id = %event.self_id,
                    event = event.event_type(),
                    "Dropping event for unknown bot"
                );
                return Ok(());
            }
        };

        self.sink.dispatch(bot, event).await;
        Ok(())
    }

    async fn handle_login(&self, event: &Event) {
        info!("{}", event.log_line());
        let Some(login) = event.login() else {
            return;
        };

        match &event.kind {
            EventKind::LoginAdded(_) | EventKind::LoginUpdated(_) => {
                let mut login = login.clone();
                login.self_id.get_or_insert_with(|| event.self_id.clone());
                login.platform.get_or_insert_with(|| event.platform.clone());
                self.connect_logins(vec![login]).await;
            }
            EventKind::LoginRemoved(_) => {
                let self_id = login.self_id.as_deref().unwrap_or(&event.self_id);
                if self.registry.unregister(self_id).is_some() {
                    info!(self_id = %self_id, "Bot removed");
                    self.sink.on_bot_removed(self_id).await;
                }
            }
            _ => {}
        }
    }

    /// Registers every complete login that is not known yet.
    async fn connect_logins(&self, logins: Vec<Login>) {
        for login in logins {
            let (Some(self_id), Some(user)) = (login.self_id, login.user) else {
                continue;
            };
            let platform = login.platform.unwrap_or_default();
            if platform == IGNORED_PLATFORM {
                continue;
            }
            self.register(self_id, platform, user).await;
        }
    }

    /// Registers a bot, returning the registered instance.
    ///
    /// An already registered `self_id` keeps its existing bot.
    async fn register(
        &self,
        self_id: String,
        platform: String,
        user: User,
    ) -> Option<Arc<SatoriBot>> {
        let name = user.name.clone().unwrap_or_else(|| "None".to_string());
        let bot = SatoriBot::new(
            self_id.as_str(),
            platform.as_str(),
            user,
            Arc::clone(&self.config),
            Arc::clone(&self.http),
        );
        match self.registry.register(bot) {
            Some(bot) => {
                info!("[{ADAPTER_NAME}|{self_id}] {name} 已连接到平台 {platform}");
                self.sink.on_bot_ready(Arc::clone(&bot)).await;
                Some(bot)
            }
            None => {
                trace!(self_id = %self_id, "Bot already registered");
                self.registry.get(&self_id)
            }
        }
    }

    /// Confirms an account through `login.get` and registers it.
    async fn verify(&self, self_id: &str, platform: &str) -> AdapterResult<Arc<SatoriBot>> {
        if let Some(bot) = self.registry.get(self_id) {
            return Ok(bot);
        }

        let probe_user = User {
            id: self_id.to_string(),
            name: None,
            nick: None,
            avatar: None,
            is_bot: None,
        };
        let probe = SatoriBot::new(
            self_id,
            platform,
            probe_user,
            Arc::clone(&self.config),
            Arc::clone(&self.http),
        );
        let login = probe
            .login_get()
            .await
            .map_err(|e| AdapterError::Internal(format!("login.get failed: {e}")))?;
        let user = login.user.ok_or_else(|| {
            AdapterError::Internal(format!("no user returned for bot [{self_id}|{platform}]"))
        })?;

        self.register(self_id.to_string(), platform.to_string(), user)
            .await
            .ok_or_else(|| {
                AdapterError::Internal(format!("bot {self_id} was removed during verification"))
            })
    }

    /// Posts a raw payload to the Dev mode webhook target.
    async fn forward(&self, value: Value) {
        let Some(target) = self.config.webhook_target() else {
            warn!("Dev mode has no webhook target, dropping frame");
            return;
        };
        if let Err(e) = self.http.post_json(HttpRequest::new(target, value)).await {
            warn!(error = %e, "Webhook forward failed");
        }
    }
}

impl std::fmt::Debug for SatoriAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SatoriAdapter")
            .field("mode", &self.config.mode)
            .field("bots", &self.registry.len())
            .field("sequence", &self.sequence())
            .finish()
    }
}

#[async_trait]
impl PayloadHandler for SatoriAdapter {
    async fn handle_payload(&self, body: &[u8]) -> TransportResult<()> {
        self.handle_webhook(body)
            .await
            .map_err(|e| TransportError::InvalidPayload(e.to_string()))
    }
}

fn is_ignored(value: &Value) -> bool {
    value
        .pointer("/body/platform")
        .and_then(Value::as_str)
        .is_some_and(|platform| platform == IGNORED_PLATFORM)
}
