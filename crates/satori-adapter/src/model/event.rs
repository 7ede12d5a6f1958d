//! Satori event taxonomy.
//!
//! An [`EventBody`] off the wire is checked against its `type` and turned into
//! an [`Event`]: the common header plus one [`EventKind`] variant whose
//! required fields are guaranteed present.
//!
//! # Variants
//!
//! ```text
//! EventKind
//! ├── Guild{Added, Updated, Removed, Request}          (guild)
//! ├── GuildMember{Added, Updated, Removed, Request}    (guild, member, user)
//! ├── GuildRole{Created, Updated, Deleted}             (guild, role)
//! ├── Login{Added, Removed, Updated}                   (login)
//! ├── Message{Created, Updated, Deleted}               (channel, user, message)
//! ├── Reaction{Added, Removed}                         (all optional)
//! ├── FriendRequest                                    (user)
//! └── Internal
//! ```
//!
//! Message events additionally carry the parsed [`Message`] twice: a working
//! copy that preprocessing and handlers may edit, and an untouched snapshot.

use serde::Serialize;

use satori_core::{DecodeError, DecodeResult, EventError, EventResult};

use super::message::Message;
use super::segment::Segment;
use super::signal::EventBody;
use super::types::{Channel, Guild, GuildMember, GuildRole, Login, User, WireMessage};

// ============================================================================
// Variant data
// ============================================================================

/// Data of `guild-*` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildEvent {
    pub guild: Guild,
}

/// Data of `guild-member-*` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildMemberEvent {
    pub guild: Guild,
    pub member: GuildMember,
    pub user: User,
}

/// Data of `guild-role-*` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuildRoleEvent {
    pub guild: Guild,
    pub role: GuildRole,
}

/// Data of `login-*` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginEvent {
    pub login: Login,
}

/// Data of `message-*` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    pub channel: Channel,
    pub user: User,
    /// The message resource as received.
    #[serde(rename = "message")]
    pub wire: WireMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,
    /// Working copy of the content; preprocessing edits it in place.
    #[serde(skip)]
    pub message: Message,
    /// The content exactly as parsed.
    #[serde(skip)]
    pub original_message: Message,
    /// Set when the message addressed the bot.
    #[serde(skip)]
    pub to_me: bool,
    /// The quote segment removed by reply extraction.
    #[serde(skip)]
    pub reply: Option<Segment>,
}

impl MessageEvent {
    fn new(
        channel: Channel,
        user: User,
        wire: WireMessage,
        guild: Option<Guild>,
        member: Option<GuildMember>,
    ) -> Self {
        let message = Message::parse(&wire.content);
        Self {
            channel,
            user,
            guild,
            member,
            original_message: message.clone(),
            message,
            wire,
            to_me: false,
            reply: None,
        }
    }

    /// Id of the message resource.
    pub fn message_id(&self) -> &str {
        &self.wire.id
    }
}

/// Data of `reaction-*` events. The gateway may omit any of the fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<WireMessage>,
}

/// Data of `friend-request` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FriendRequestEvent {
    pub user: User,
}

/// Data of `internal` events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

// ============================================================================
// EventKind
// ============================================================================

/// One variant per wire event type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventKind {
    GuildAdded(GuildEvent),
    GuildUpdated(GuildEvent),
    GuildRemoved(GuildEvent),
    GuildRequest(GuildEvent),
    GuildMemberAdded(GuildMemberEvent),
    GuildMemberUpdated(GuildMemberEvent),
    GuildMemberRemoved(GuildMemberEvent),
    GuildMemberRequest(GuildMemberEvent),
    GuildRoleCreated(GuildRoleEvent),
    GuildRoleUpdated(GuildRoleEvent),
    GuildRoleDeleted(GuildRoleEvent),
    LoginAdded(LoginEvent),
    LoginRemoved(LoginEvent),
    LoginUpdated(LoginEvent),
    MessageCreated(Box<MessageEvent>),
    MessageUpdated(Box<MessageEvent>),
    MessageDeleted(Box<MessageEvent>),
    ReactionAdded(ReactionEvent),
    ReactionRemoved(ReactionEvent),
    FriendRequest(FriendRequestEvent),
    Internal(InternalEvent),
}

impl EventKind {
    /// The wire `type` string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GuildAdded(_) => "guild-added",
            Self::GuildUpdated(_) => "guild-updated",
            Self::GuildRemoved(_) => "guild-removed",
            Self::GuildRequest(_) => "guild-request",
            Self::GuildMemberAdded(_) => "guild-member-added",
            Self::GuildMemberUpdated(_) => "guild-member-updated",
            Self::GuildMemberRemoved(_) => "guild-member-removed",
            Self::GuildMemberRequest(_) => "guild-member-request",
            Self::GuildRoleCreated(_) => "guild-role-created",
            Self::GuildRoleUpdated(_) => "guild-role-updated",
            Self::GuildRoleDeleted(_) => "guild-role-deleted",
            Self::LoginAdded(_) => "login-added",
            Self::LoginRemoved(_) => "login-removed",
            Self::LoginUpdated(_) => "login-updated",
            Self::MessageCreated(_) => "message-created",
            Self::MessageUpdated(_) => "message-updated",
            Self::MessageDeleted(_) => "message-deleted",
            Self::ReactionAdded(_) => "reaction-added",
            Self::ReactionRemoved(_) => "reaction-removed",
            Self::FriendRequest(_) => "friend-request",
            Self::Internal(_) => "internal",
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// A decoded Satori event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Event id; doubles as the resume sequence number.
    pub id: i64,
    pub platform: String,
    pub self_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
    pub operator: Option<User>,
    pub kind: EventKind,
}

fn require<T>(value: Option<T>, event_type: &str, field: &'static str) -> DecodeResult<T> {
    value.ok_or_else(|| DecodeError::MissingField {
        event_type: event_type.to_string(),
        field,
    })
}

impl Event {
    /// Checks a raw event body against its type.
    pub fn decode(body: EventBody) -> DecodeResult<Self> {
        let EventBody {
            id,
            event_type,
            platform,
            self_id,
            timestamp,
            channel,
            guild,
            login,
            member,
            message,
            operator,
            role,
            user,
        } = body;
        let t = event_type.as_str();

        let kind = match t {
            "guild-added" | "guild-updated" | "guild-removed" | "guild-request" => {
                let data = GuildEvent {
                    guild: require(guild, t, "guild")?,
                };
                match t {
                    "guild-added" => EventKind::GuildAdded(data),
                    "guild-updated" => EventKind::GuildUpdated(data),
                    "guild-removed" => EventKind::GuildRemoved(data),
                    _ => EventKind::GuildRequest(data),
                }
            }
            "guild-member-added"
            | "guild-member-updated"
            | "guild-member-removed"
            | "guild-member-request" => {
                let data = GuildMemberEvent {
                    guild: require(guild, t, "guild")?,
                    member: require(member, t, "member")?,
                    user: require(user, t, "user")?,
                };
                match t {
                    "guild-member-added" => EventKind::GuildMemberAdded(data),
                    "guild-member-updated" => EventKind::GuildMemberUpdated(data),
                    "guild-member-removed" => EventKind::GuildMemberRemoved(data),
                    _ => EventKind::GuildMemberRequest(data),
                }
            }
            "guild-role-created" | "guild-role-updated" | "guild-role-deleted" => {
                let data = GuildRoleEvent {
                    guild: require(guild, t, "guild")?,
                    role: require(role, t, "role")?,
                };
                match t {
                    "guild-role-created" => EventKind::GuildRoleCreated(data),
                    "guild-role-updated" => EventKind::GuildRoleUpdated(data),
                    _ => EventKind::GuildRoleDeleted(data),
                }
            }
            "login-added" | "login-removed" | "login-updated" => {
                let data = LoginEvent {
                    login: require(login, t, "login")?,
                };
                match t {
                    "login-added" => EventKind::LoginAdded(data),
                    "login-removed" => EventKind::LoginRemoved(data),
                    _ => EventKind::LoginUpdated(data),
                }
            }
            "message-created" | "message-updated" | "message-deleted" => {
                let data = Box::new(MessageEvent::new(
                    require(channel, t, "channel")?,
                    require(user, t, "user")?,
                    require(message, t, "message")?,
                    guild,
                    member,
                ));
                match t {
                    "message-created" => EventKind::MessageCreated(data),
                    "message-updated" => EventKind::MessageUpdated(data),
                    _ => EventKind::MessageDeleted(data),
                }
            }
            "reaction-added" | "reaction-removed" => {
                let data = ReactionEvent {
                    channel,
                    guild,
                    user,
                    message,
                };
                match t {
                    "reaction-added" => EventKind::ReactionAdded(data),
                    _ => EventKind::ReactionRemoved(data),
                }
            }
            "friend-request" => EventKind::FriendRequest(FriendRequestEvent {
                user: require(user, t, "user")?,
            }),
            "internal" => EventKind::Internal(InternalEvent {
                channel,
                guild,
                user,
            }),
            _ => return Err(DecodeError::UnknownEventType(event_type)),
        };

        Ok(Self {
            id,
            platform,
            self_id,
            timestamp,
            operator,
            kind,
        })
    }

    /// The wire `type` string.
    pub fn event_type(&self) -> &'static str {
        self.kind.name()
    }

    /// Message event data, if this is a `message-*` event.
    pub fn message_event(&self) -> EventResult<&MessageEvent> {
        match &self.kind {
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Ok(&**e),
            _ => Err(EventError::NoMessage(self.event_type().to_string())),
        }
    }

    /// Mutable message event data, if this is a `message-*` event.
    pub fn message_event_mut(&mut self) -> EventResult<&mut MessageEvent> {
        let event_type = self.event_type();
        match &mut self.kind {
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Ok(&mut **e),
            _ => Err(EventError::NoMessage(event_type.to_string())),
        }
    }

    /// Whether this is a `message-*` event.
    pub fn is_message(&self) -> bool {
        self.message_event().is_ok()
    }

    /// The working message of a message event.
    pub fn message(&self) -> EventResult<&Message> {
        self.message_event().map(|e| &e.message)
    }

    /// The working message of a message event, for in-place edits.
    pub fn message_mut(&mut self) -> EventResult<&mut Message> {
        self.message_event_mut().map(|e| &mut e.message)
    }

    /// Whether preprocessing decided the event addresses the bot.
    pub fn is_to_me(&self) -> bool {
        self.message_event().is_ok_and(|e| e.to_me)
    }

    /// The user the event is about.
    pub fn user(&self) -> Option<&User> {
        match &self.kind {
            EventKind::GuildMemberAdded(e)
            | EventKind::GuildMemberUpdated(e)
            | EventKind::GuildMemberRemoved(e)
            | EventKind::GuildMemberRequest(e) => Some(&e.user),
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Some(&e.user),
            EventKind::ReactionAdded(e) | EventKind::ReactionRemoved(e) => e.user.as_ref(),
            EventKind::FriendRequest(e) => Some(&e.user),
            _ => None,
        }
    }

    /// Id of the user the event is about.
    pub fn user_id(&self) -> EventResult<&str> {
        self.user()
            .map(|user| user.id.as_str())
            .ok_or_else(|| EventError::NoUserId(self.event_type().to_string()))
    }

    /// Scope id used for bans: the guild id, or the channel id for messages.
    pub fn guild_id(&self) -> EventResult<&str> {
        let id = match &self.kind {
            EventKind::GuildAdded(e)
            | EventKind::GuildUpdated(e)
            | EventKind::GuildRemoved(e)
            | EventKind::GuildRequest(e) => Some(&e.guild.id),
            EventKind::GuildMemberAdded(e)
            | EventKind::GuildMemberUpdated(e)
            | EventKind::GuildMemberRemoved(e)
            | EventKind::GuildMemberRequest(e) => Some(&e.guild.id),
            EventKind::GuildRoleCreated(e)
            | EventKind::GuildRoleUpdated(e)
            | EventKind::GuildRoleDeleted(e) => Some(&e.guild.id),
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Some(&e.channel.id),
            EventKind::ReactionAdded(e) | EventKind::ReactionRemoved(e) => {
                e.channel.as_ref().map(|c| &c.id)
            }
            _ => None,
        };
        id.map(String::as_str)
            .ok_or_else(|| EventError::NoGuildId(self.event_type().to_string()))
    }

    /// The channel a reply should go to.
    pub fn channel(&self) -> Option<&Channel> {
        match &self.kind {
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Some(&e.channel),
            EventKind::ReactionAdded(e) | EventKind::ReactionRemoved(e) => e.channel.as_ref(),
            EventKind::Internal(e) => e.channel.as_ref(),
            _ => None,
        }
    }

    /// The message resource the event refers to.
    pub fn wire_message(&self) -> Option<&WireMessage> {
        match &self.kind {
            EventKind::MessageCreated(e)
            | EventKind::MessageUpdated(e)
            | EventKind::MessageDeleted(e) => Some(&e.wire),
            EventKind::ReactionAdded(e) | EventKind::ReactionRemoved(e) => e.message.as_ref(),
            _ => None,
        }
    }

    /// The login of a `login-*` event.
    pub fn login(&self) -> Option<&Login> {
        match &self.kind {
            EventKind::LoginAdded(e) | EventKind::LoginRemoved(e) | EventKind::LoginUpdated(e) => {
                Some(&e.login)
            }
            _ => None,
        }
    }

    /// One-line description for the event log.
    pub fn log_line(&self) -> String {
        if let Some(login) = self.login() {
            let account = match &login.user {
                Some(user) => format!(
                    "{} ({})",
                    user.name.as_deref().unwrap_or("None"),
                    user.id
                ),
                None => "None".to_string(),
            };
            return format!(
                "[{}]机器人 {} 在平台 {} 上的状态发生更新：{}",
                self.event_type(),
                account,
                login.platform.as_deref().unwrap_or("None"),
                login.status.name()
            );
        }

        if let Ok(e) = self.message_event() {
            let mut line = String::new();
            if let Some(guild) = &e.guild {
                line.push_str(&format!(
                    "[来自群组 {} ({})]",
                    guild.name.as_deref().unwrap_or("None"),
                    guild.id
                ));
            }
            let user_name = e.user.name.as_deref();
            match &e.member {
                Some(member) => match (&member.nick, user_name) {
                    (Some(nick), _) => line.push_str(nick),
                    (None, Some(name)) if !name.is_empty() => line.push_str(name),
                    _ => line.push_str(&format!("QQ用户{}", e.user.id)),
                },
                None => line.push_str(user_name.unwrap_or("None")),
            }
            line.push_str(&format!(": {}", e.message.log()));
            return line;
        }

        format!(
            "[{}]{}",
            self.event_type(),
            serde_json::to_string(&self.kind).unwrap_or_default()
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn body(value: serde_json::Value) -> EventBody {
        let mut base = json!({
            "id": 1,
            "platform": "discord",
            "self_id": "bot",
            "timestamp": 1_700_000_000_000_i64,
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
            base.extend(extra.clone());
        }
        serde_json::from_value(base).unwrap()
    }

    fn message_body(extra: serde_json::Value) -> EventBody {
        let mut value = json!({
            "type": "message-created",
            "channel": {"id": "c1", "type": 0},
            "user": {"id": "u1", "name": "Alice"},
            "message": {"id": "m1", "content": "<at id=\"bot\"/> hello"},
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        body(value)
    }

    #[test]
    fn test_decode_message_event() {
        let event = Event::decode(message_body(json!({}))).unwrap();
        assert_eq!(event.event_type(), "message-created");
        assert_eq!(event.user_id(), Ok("u1"));
        assert_eq!(event.guild_id(), Ok("c1"));
        assert!(!event.is_to_me());

        let data = event.message_event().unwrap();
        assert_eq!(data.message, data.original_message);
        assert_eq!(data.message.len(), 2);
        assert_eq!(data.message_id(), "m1");
    }

    #[test]
    fn test_missing_field() {
        let err = Event::decode(body(json!({"type": "guild-member-added", "guild": {"id": "g"}})))
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingField { field: "member", .. }
        ));
    }

    #[test]
    fn test_unknown_type() {
        let err = Event::decode(body(json!({"type": "totally-unknown"}))).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEventType(t) if t == "totally-unknown"));
    }

    #[test]
    fn test_unaddressable_accessors() {
        let event = Event::decode(body(json!({"type": "internal"}))).unwrap();
        assert_eq!(
            event.user_id(),
            Err(EventError::NoUserId("internal".to_string()))
        );
        assert!(event.guild_id().is_err());
        assert!(event.message().is_err());

        let event = Event::decode(body(json!({
            "type": "guild-role-created",
            "guild": {"id": "g"},
            "role": {"id": "r"},
        })))
        .unwrap();
        assert_eq!(event.guild_id(), Ok("g"));
        assert!(event.user_id().is_err());

        let event = Event::decode(body(json!({"type": "reaction-added"}))).unwrap();
        assert!(event.guild_id().is_err());
        assert!(event.user_id().is_err());
    }

    #[test]
    fn test_login_log_line() {
        let event = Event::decode(body(json!({
            "type": "login-updated",
            "login": {"user": {"id": "42", "name": "Bot"}, "platform": "discord", "status": 1},
        })))
        .unwrap();
        assert_eq!(
            event.log_line(),
            "[login-updated]机器人 Bot (42) 在平台 discord 上的状态发生更新：ONLINE"
        );
    }

    #[test]
    fn test_message_log_line() {
        let event = Event::decode(message_body(json!({}))).unwrap();
        assert_eq!(event.log_line(), "Alice: @bot  hello");

        let event = Event::decode(message_body(json!({
            "guild": {"id": "g1", "name": "Group"},
            "member": {},
            "user": {"id": "u2", "name": ""},
        })))
        .unwrap();
        assert_eq!(
            event.log_line(),
            "[来自群组 Group (g1)]QQ用户u2: @bot  hello"
        );
    }

    #[test]
    fn test_default_log_line() {
        let event = Event::decode(body(json!({
            "type": "friend-request",
            "user": {"id": "u"},
        })))
        .unwrap();
        assert_eq!(event.log_line(), r#"[friend-request]{"user":{"id":"u"}}"#);
    }
}
