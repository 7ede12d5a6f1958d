//! Satori bot implementation.
//!
//! [`SatoriBot`] is the API facade of one logged-in account. Every method is
//! a JSON POST to `http://{ip}:{port}{path}/v{version}/{api}` carrying the
//! account headers, so a bot is cheap to clone into handler tasks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use satori_adapter::{Event, Message, SatoriBot, Segment, SendOptions};
//!
//! async fn echo(bot: Arc<SatoriBot>, event: Event) -> anyhow::Result<()> {
//!     let text = event.message()?.extract_plain_text();
//!     bot.send(&event, Segment::bold(text), SendOptions::reply()).await?;
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, trace};

use satori_core::{
    ApiError, ApiErrorKind, ApiResult, EventError, HttpClient, HttpRequest,
};

use crate::config::AdapterConfig;
use crate::model::event::Event;
use crate::model::message::Message;
use crate::model::segment::Segment;
use crate::model::types::{
    Channel, Guild, GuildMember, GuildRole, Login, Pagination, User, WireMessage,
};

// =============================================================================
// SendOptions
// =============================================================================

/// Extra decoration for [`SatoriBot::send`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendOptions {
    /// Append a mention of the event's user.
    pub at_sender: bool,
    /// Quote the event's message.
    pub reply: bool,
}

impl SendOptions {
    pub fn at_sender() -> Self {
        Self {
            at_sender: true,
            reply: false,
        }
    }

    pub fn reply() -> Self {
        Self {
            at_sender: false,
            reply: true,
        }
    }
}

// =============================================================================
// SatoriBot
// =============================================================================

/// One logged-in Satori account.
pub struct SatoriBot {
    self_id: String,
    platform: String,
    user: User,
    config: Arc<AdapterConfig>,
    http: Arc<dyn HttpClient>,
}

impl SatoriBot {
    /// Creates a bot for an account whose user is known.
    pub fn new(
        self_id: impl Into<String>,
        platform: impl Into<String>,
        user: User,
        config: Arc<AdapterConfig>,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            self_id: self_id.into(),
            platform: platform.into(),
            user,
            config,
            http,
        }
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// The bot's own user record.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Id used to recognize mentions of the bot.
    pub fn user_id(&self) -> &str {
        if self.user.id.is_empty() {
            &self.self_id
        } else {
            &self.user.id
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Whether `user_id` is the configured owner.
    pub fn is_host(&self, user_id: &str) -> bool {
        user_id == self.config.host_id
    }

    /// Calls an API method with named parameters.
    ///
    /// A 2xx response yields its JSON body (`null` when empty); any other
    /// status maps to an [`ApiError::Status`].
    pub async fn request(&self, api: &str, params: Value) -> ApiResult<Value> {
        let mut request = HttpRequest::new(self.config.api_url(api), params)
            .header("Content-Type", "application/json")
            .header("X-Self-ID", self.self_id.as_str())
            .header("X-Platform", self.platform.as_str());
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        debug!(self_id = %self.self_id, api = %api, "Calling Satori API");
        trace!(body = %request.body, "API request");

        let response = self.http.post_json(request).await?;
        if let Some(kind) = ApiErrorKind::from_status(response.status) {
            debug!(api = %api, status = response.status, body = %response.body, "API call rejected");
            return Err(ApiError::Status {
                api: api.to_string(),
                kind,
                status: response.status,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        trace!(body = %response.body, "API response");
        Ok(serde_json::from_str(&response.body)?)
    }

    /// Sends a message into the channel an event came from.
    pub async fn send(
        &self,
        event: &Event,
        message: impl Into<Message>,
        options: SendOptions,
    ) -> ApiResult<Vec<WireMessage>> {
        let channel = event
            .channel()
            .ok_or_else(|| EventError::NoChannel(event.event_type().to_string()))?;

        let mut message = message.into();
        if options.at_sender {
            message += Segment::at(event.user_id()?);
        }
        if options.reply {
            let quoted = event
                .wire_message()
                .ok_or_else(|| EventError::NoMessage(event.event_type().to_string()))?;
            message.insert(0, Segment::quote(quoted.id.as_str()));
        }

        self.message_create(&channel.id, &message.to_string()).await
    }

    /// Calls an `internal/{method}` API.
    pub async fn internal(&self, method: &str, data: Value) -> ApiResult<Value> {
        self.request(&format!("internal/{method}"), data).await
    }
}

impl fmt::Debug for SatoriBot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SatoriBot")
            .field("self_id", &self.self_id)
            .field("platform", &self.platform)
            .field("user", &self.user.id)
            .finish()
    }
}

// =============================================================================
// Typed APIs
// =============================================================================

macro_rules! impl_api {
    // No return value
    ($(#[$meta:meta])* $name:ident, $api:literal, ($($arg:ident: $typ:ty),*) $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self, $($arg: $typ),*) -> ApiResult<()> {
            self.request($api, json!({ $(stringify!($arg): $arg),* })).await?;
            Ok(())
        }
    };
    // Returns a type T deserialized from the response body
    ($(#[$meta:meta])* $name:ident, $api:literal, ($($arg:ident: $typ:ty),*) -> $ret:ty $(,)?) => {
        $(#[$meta])*
        pub async fn $name(&self, $($arg: $typ),*) -> ApiResult<$ret> {
            let result = self.request($api, json!({ $(stringify!($arg): $arg),* })).await?;
            Ok(serde_json::from_value::<$ret>(result)?)
        }
    };
}

impl SatoriBot {
    // =========================================================================
    // Channels
    // =========================================================================

    impl_api!(channel_get, "channel.get", (channel_id: &str) -> Channel);

    impl_api!(
        channel_list,
        "channel.list",
        (guild_id: &str, next: Option<&str>) -> Pagination<Channel>
    );

    impl_api!(
        channel_create,
        "channel.create",
        (guild_id: &str, data: &Channel) -> Channel
    );

    impl_api!(channel_update, "channel.update", (channel_id: &str, data: &Channel));

    impl_api!(channel_delete, "channel.delete", (channel_id: &str));

    impl_api!(
        /// Opens a direct channel with a user.
        user_channel_create,
        "user.channel.create",
        (user_id: &str, guild_id: Option<&str>) -> Channel
    );

    // =========================================================================
    // Guilds
    // =========================================================================

    impl_api!(guild_get, "guild.get", (guild_id: &str) -> Guild);

    impl_api!(guild_list, "guild.list", (next: Option<&str>) -> Pagination<Guild>);

    impl_api!(
        /// Handles an invitation to join a guild.
        guild_approve,
        "guild.approve",
        (message_id: &str, approve: bool, comment: &str)
    );

    impl_api!(
        guild_member_get,
        "guild.member.get",
        (guild_id: &str, user_id: &str) -> GuildMember
    );

    impl_api!(
        guild_member_list,
        "guild.member.list",
        (guild_id: &str, next: Option<&str>) -> Pagination<GuildMember>
    );

    impl_api!(
        /// Kicks a member; `permanent` also prevents rejoining.
        guild_member_kick,
        "guild.member.kick",
        (guild_id: &str, user_id: &str, permanent: Option<bool>)
    );

    impl_api!(
        guild_member_approve,
        "guild.member.approve",
        (message_id: &str, approve: bool, comment: Option<&str>)
    );

    impl_api!(
        guild_member_role_set,
        "guild.member.role.set",
        (guild_id: &str, user_id: &str, role_id: &str)
    );

    impl_api!(
        guild_member_role_unset,
        "guild.member.role.unset",
        (guild_id: &str, user_id: &str, role_id: &str)
    );

    impl_api!(
        guild_role_list,
        "guild.role.list",
        (guild_id: &str, next: Option<&str>) -> Pagination<GuildRole>
    );

    impl_api!(
        guild_role_create,
        "guild.role.create",
        (guild_id: &str, role: &GuildRole) -> GuildRole
    );

    impl_api!(
        guild_role_update,
        "guild.role.update",
        (guild_id: &str, role_id: &str, role: &GuildRole)
    );

    impl_api!(
        guild_role_delete,
        "guild.role.delete",
        (guild_id: &str, role_id: &str)
    );

    // =========================================================================
    // Login
    // =========================================================================

    impl_api!(login_get, "login.get", () -> Login);

    // =========================================================================
    // Messages
    // =========================================================================

    impl_api!(
        /// Sends markup into a channel; the gateway may split it into several messages.
        message_create,
        "message.create",
        (channel_id: &str, content: &str) -> Vec<WireMessage>
    );

    impl_api!(
        message_get,
        "message.get",
        (channel_id: &str, message_id: &str) -> WireMessage
    );

    impl_api!(
        message_delete,
        "message.delete",
        (channel_id: &str, message_id: &str)
    );

    impl_api!(
        message_update,
        "message.update",
        (channel_id: &str, message_id: &str, content: &str)
    );

    impl_api!(
        message_list,
        "message.list",
        (channel_id: &str, next: Option<&str>) -> Pagination<WireMessage>
    );

    // =========================================================================
    // Users
    // =========================================================================

    impl_api!(user_get, "user.get", (user_id: &str) -> User);

    impl_api!(friend_list, "friend.list", (next: Option<&str>) -> Pagination<User>);

    impl_api!(
        friend_approve,
        "friend.approve",
        (message_id: &str, approve: bool, comment: Option<&str>)
    );
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use satori_core::{HttpResponse, TransportResult};

    use crate::model::signal::EventBody;

    /// Records every request and answers with a fixed response.
    pub(crate) struct MockHttp {
        pub requests: Mutex<Vec<HttpRequest>>,
        status: u16,
        body: String,
    }

    impl MockHttp {
        pub(crate) fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                requests: Mutex::new(Vec::new()),
                status,
                body: body.to_string(),
            })
        }
    }

    #[async_trait]
    impl HttpClient for MockHttp {
        async fn post_json(&self, request: HttpRequest) -> TransportResult<HttpResponse> {
            self.requests.lock().push(request);
            Ok(HttpResponse {
                status: self.status,
                body: self.body.clone(),
            })
        }
    }

    pub(crate) fn test_bot(http: Arc<MockHttp>) -> SatoriBot {
        let config = AdapterConfig {
            host_id: "owner".into(),
            ip: "127.0.0.1".into(),
            port: 5140,
            path: "/satori".into(),
            token: Some("secret".into()),
            ..Default::default()
        };
        let user = User {
            id: "bot".into(),
            name: Some("Bot".into()),
            nick: None,
            avatar: None,
            is_bot: Some(true),
        };
        SatoriBot::new("bot", "discord", user, Arc::new(config), http)
    }

    fn message_event() -> Event {
        let body: EventBody = serde_json::from_value(json!({
            "id": 1,
            "type": "message-created",
            "platform": "discord",
            "self_id": "bot",
            "timestamp": 0,
            "channel": {"id": "c1", "type": 0},
            "user": {"id": "u1"},
            "message": {"id": "m1", "content": "hi"},
        }))
        .unwrap();
        Event::decode(body).unwrap()
    }

    fn header<'a>(request: &'a HttpRequest, name: &str) -> Option<&'a str> {
        request
            .headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_request_headers_and_url() {
        let http = MockHttp::new(200, r#"{"id":"c1","type":0}"#);
        let bot = test_bot(http.clone());

        let channel = bot.channel_get("c1").await.unwrap();
        assert_eq!(channel.id, "c1");

        let requests = http.requests.lock();
        let request = &requests[0];
        assert_eq!(request.url, "http://127.0.0.1:5140/satori/v1/channel.get");
        assert_eq!(request.body, json!({"channel_id": "c1"}));
        assert_eq!(header(request, "Authorization"), Some("Bearer secret"));
        assert_eq!(header(request, "X-Self-ID"), Some("bot"));
        assert_eq!(header(request, "X-Platform"), Some("discord"));
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let bot = test_bot(MockHttp::new(403, "denied"));
        let err = bot.message_delete("c", "m").await.unwrap_err();
        assert_eq!(err.kind(), Some(ApiErrorKind::Forbidden));

        let bot = test_bot(MockHttp::new(503, ""));
        let err = bot.login_get().await.unwrap_err();
        assert_eq!(err.kind(), Some(ApiErrorKind::ServerError));
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let bot = test_bot(MockHttp::new(200, ""));
        assert_eq!(bot.request("guild.approve", json!({})).await.unwrap(), Value::Null);
        bot.guild_member_kick("g", "u", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_with_options() {
        let http = MockHttp::new(200, r#"[{"id":"m2","content":"ok"}]"#);
        let bot = test_bot(http.clone());
        let event = message_event();

        let sent = bot
            .send(
                &event,
                "pong",
                SendOptions {
                    at_sender: true,
                    reply: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(sent[0].id, "m2");

        let requests = http.requests.lock();
        assert_eq!(
            requests[0].body,
            json!({
                "channel_id": "c1",
                "content": r#"<quote id="m1"/>pong<at id="u1"/>"#,
            })
        );
    }

    #[tokio::test]
    async fn test_send_without_channel_fails() {
        let body: EventBody = serde_json::from_value(json!({
            "id": 1,
            "type": "friend-request",
            "platform": "discord",
            "self_id": "bot",
            "timestamp": 0,
            "user": {"id": "u"},
        }))
        .unwrap();
        let event = Event::decode(body).unwrap();
        let bot = test_bot(MockHttp::new(200, "[]"));
        let err = bot.send(&event, "hi", SendOptions::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Event(EventError::NoChannel(_))));
    }

    #[test]
    fn test_is_host() {
        let bot = test_bot(MockHttp::new(200, ""));
        assert!(bot.is_host("owner"));
        assert!(!bot.is_host("bot"));
        assert_eq!(bot.user_id(), "bot");
    }
}
