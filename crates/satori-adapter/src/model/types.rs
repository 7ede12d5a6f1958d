//! Satori resource types.
//!
//! Plain identity records exchanged with the gateway: channels, guilds,
//! users, members, roles, logins and messages. Timestamps are Unix
//! milliseconds; the gateway may send them as numbers or numeric strings.

use serde::{Deserialize, Deserializer, Serialize};

/// Channel kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ChannelType {
    Text,
    Voice,
    Category,
    Direct,
}

impl TryFrom<u8> for ChannelType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Text),
            1 => Ok(Self::Voice),
            2 => Ok(Self::Category),
            3 => Ok(Self::Direct),
            other => Err(format!("invalid channel type: {other}")),
        }
    }
}

impl From<ChannelType> for u8 {
    fn from(value: ChannelType) -> Self {
        match value {
            ChannelType::Text => 0,
            ChannelType::Voice => 1,
            ChannelType::Category => 2,
            ChannelType::Direct => 3,
        }
    }
}

/// A channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A guild (group / server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// A user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_bot: Option<bool>,
}

/// A member of a guild.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuildMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Join time in Unix milliseconds.
    #[serde(
        default,
        deserialize_with = "deserialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub joined_at: Option<i64>,
}

/// A guild role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRole {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Login status of a bot account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LoginStatus {
    Offline,
    Online,
    Connect,
    Disconnect,
    Reconnect,
}

impl LoginStatus {
    /// Upper-case name used in log lines.
    pub fn name(self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::Online => "ONLINE",
            Self::Connect => "CONNECT",
            Self::Disconnect => "DISCONNECT",
            Self::Reconnect => "RECONNECT",
        }
    }
}

impl TryFrom<u8> for LoginStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Offline),
            1 => Ok(Self::Online),
            2 => Ok(Self::Connect),
            3 => Ok(Self::Disconnect),
            4 => Ok(Self::Reconnect),
            other => Err(format!("invalid login status: {other}")),
        }
    }
}

impl From<LoginStatus> for u8 {
    fn from(value: LoginStatus) -> Self {
        match value {
            LoginStatus::Offline => 0,
            LoginStatus::Online => 1,
            LoginStatus::Connect => 2,
            LoginStatus::Disconnect => 3,
            LoginStatus::Reconnect => 4,
        }
    }
}

/// A logged-in bot account as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    pub status: LoginStatus,
}

/// A message resource as sent on the wire.
///
/// `content` is the raw markup. Decoding normalizes a few gateway quirks:
///
/// - a bare string is a message id with content `Unknown`;
/// - a quoted message's id is prepended as `<quote id="…" forward/>`;
/// - a missing content becomes `Unknown`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WireMessage {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<Box<WireMessage>>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

/// Content used when the gateway omits it.
pub const UNKNOWN_CONTENT: &str = "Unknown";

#[derive(Deserialize)]
struct RawWireMessage {
    id: String,
    #[serde(default)]
    quote: Option<WireMessage>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    channel: Option<Channel>,
    #[serde(default)]
    guild: Option<Guild>,
    #[serde(default)]
    member: Option<GuildMember>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default, deserialize_with = "deserialize_millis")]
    created_at: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_millis")]
    updated_at: Option<i64>,
}

impl<'de> Deserialize<'de> for WireMessage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum MessageFormat {
            Id(String),
            Full(Box<RawWireMessage>),
        }

        let raw = match MessageFormat::deserialize(deserializer)? {
            MessageFormat::Id(id) => {
                return Ok(WireMessage {
                    id,
                    quote: None,
                    content: UNKNOWN_CONTENT.to_string(),
                    channel: None,
                    guild: None,
                    member: None,
                    user: None,
                    created_at: None,
                    updated_at: None,
                });
            }
            MessageFormat::Full(raw) => *raw,
        };

        let content = match (&raw.quote, raw.content) {
            (Some(quote), content) if !quote.id.is_empty() => format!(
                r#"<quote id="{}" forward/>{}"#,
                quote.id,
                content.unwrap_or_default()
            ),
            (_, Some(content)) => content,
            (_, None) => {
                tracing::debug!(id = %raw.id, "Received a message without content");
                UNKNOWN_CONTENT.to_string()
            }
        };

        Ok(WireMessage {
            id: raw.id,
            quote: raw.quote.map(Box::new),
            content,
            channel: raw.channel,
            guild: raw.guild,
            member: raw.member,
            user: raw.user,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        })
    }
}

/// One page of a paginated list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination<T> {
    pub data: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Accepts a millisecond timestamp as a number or a numeric string.
pub(crate) fn deserialize_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Millis {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<Millis>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Millis::Int(ms)) => Ok(Some(ms)),
        Some(Millis::Float(ms)) => Ok(Some(ms as i64)),
        Some(Millis::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid timestamp: {text}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_message_id() {
        let msg: WireMessage = serde_json::from_str(r#""m1""#).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.content, UNKNOWN_CONTENT);
    }

    #[test]
    fn test_quote_is_prefixed() {
        let msg: WireMessage =
            serde_json::from_str(r#"{"id":"2","content":"hi","quote":{"id":"1","content":"x"}}"#)
                .unwrap();
        assert_eq!(msg.content, r#"<quote id="1" forward/>hi"#);
        assert_eq!(msg.quote.as_ref().map(|q| q.id.as_str()), Some("1"));
    }

    #[test]
    fn test_missing_content() {
        let msg: WireMessage =
            serde_json::from_str(r#"{"id":"3","created_at":"1700000000000"}"#).unwrap();
        assert_eq!(msg.content, UNKNOWN_CONTENT);
        assert_eq!(msg.created_at, Some(1_700_000_000_000));
    }

    #[test]
    fn test_enums() {
        let channel: Channel = serde_json::from_str(r#"{"id":"c","type":3}"#).unwrap();
        assert_eq!(channel.kind, ChannelType::Direct);
        assert!(serde_json::from_str::<Channel>(r#"{"id":"c","type":9}"#).is_err());

        let login: Login = serde_json::from_str(r#"{"self_id":"1","status":1}"#).unwrap();
        assert_eq!(login.status.name(), "ONLINE");
        assert_eq!(serde_json::to_value(login.status).unwrap(), 1);
    }
}
