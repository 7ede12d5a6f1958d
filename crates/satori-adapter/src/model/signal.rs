//! Signaling frames.
//!
//! Every WebSocket frame (and every webhook body) is a JSON envelope
//! `{"op": <code>, "body": {...}}`. The `op` code decides which body shape is
//! valid:
//!
//! | op | kind | body |
//! |----|------|------|
//! | 0 | Event | [`EventBody`] |
//! | 1 | Ping | none |
//! | 2 | Pong | none |
//! | 3 | Identify | [`IdentifyBody`] |
//! | 4 | Ready | [`ReadyBody`] |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use satori_core::{DecodeError, DecodeResult};

use super::types::{Channel, Guild, GuildMember, GuildRole, Login, User, WireMessage};

/// Signaling op codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Event = 0,
    Ping = 1,
    Pong = 2,
    Identify = 3,
    Ready = 4,
}

/// Authentication body sent right after connecting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IdentifyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Last seen event id, used by the gateway to replay missed events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<i64>,
}

/// Handshake completion body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyBody {
    #[serde(default)]
    pub logins: Vec<Login>,
}

/// Raw event envelope, before it is checked against the event taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBody {
    pub id: i64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub platform: String,
    pub self_id: String,
    /// Unix milliseconds.
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Channel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild: Option<Guild>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<Login>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<GuildMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<WireMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<GuildRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    super::types::deserialize_millis(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("timestamp must not be null"))
}

/// A decoded signaling frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Event(Box<EventBody>),
    Ping,
    Pong,
    Identify(IdentifyBody),
    Ready(ReadyBody),
}

impl Signal {
    /// Decodes a frame from its JSON text.
    pub fn decode(text: &str) -> DecodeResult<Self> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Decodes a frame from an already parsed JSON value.
    pub fn from_value(value: Value) -> DecodeResult<Self> {
        #[derive(Deserialize)]
        struct Envelope {
            op: i64,
            #[serde(default)]
            body: Option<Value>,
        }

        let envelope: Envelope = serde_json::from_value(value)?;
        match envelope.op {
            0 => Ok(Self::Event(Box::new(body_as(0, envelope.body)?))),
            1 => Ok(Self::Ping),
            2 => Ok(Self::Pong),
            3 => Ok(Self::Identify(body_as(3, envelope.body)?)),
            4 => Ok(Self::Ready(body_as(4, envelope.body)?)),
            other => Err(DecodeError::UnknownOp(other)),
        }
    }

    /// The op code of this frame.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Event(_) => Opcode::Event,
            Self::Ping => Opcode::Ping,
            Self::Pong => Opcode::Pong,
            Self::Identify(_) => Opcode::Identify,
            Self::Ready(_) => Opcode::Ready,
        }
    }

    /// Encodes the frame as JSON text.
    pub fn encode(&self) -> String {
        let op = self.opcode() as i64;
        let body = match self {
            Self::Event(body) => serde_json::to_value(body).ok(),
            Self::Identify(body) => serde_json::to_value(body).ok(),
            Self::Ready(body) => serde_json::to_value(body).ok(),
            Self::Ping | Self::Pong => None,
        };
        match body {
            Some(body) => json!({ "op": op, "body": body }),
            None => json!({ "op": op }),
        }
        .to_string()
    }
}

fn body_as<T: DeserializeOwned>(op: i64, body: Option<Value>) -> DecodeResult<T> {
    let body = body.ok_or(DecodeError::BodyMismatch {
        op,
        reason: "missing body".to_string(),
    })?;
    serde_json::from_value(body).map_err(|e| DecodeError::BodyMismatch {
        op,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ping_pong() {
        assert_eq!(Signal::decode(r#"{"op":2}"#).unwrap(), Signal::Pong);
        assert_eq!(Signal::decode(r#"{"op":1,"body":null}"#).unwrap(), Signal::Ping);
    }

    #[test]
    fn test_identify_roundtrip() {
        let signal = Signal::Identify(IdentifyBody {
            token: Some("t".into()),
            sequence: Some(7),
        });
        let text = signal.encode();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"op": 3, "body": {"token": "t", "sequence": 7}}));
        assert_eq!(Signal::decode(&text).unwrap(), signal);
    }

    #[test]
    fn test_body_mismatch() {
        let err = Signal::decode(r#"{"op":4,"body":{"logins":"nope"}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::BodyMismatch { op: 4, .. }));

        let err = Signal::decode(r#"{"op":0}"#).unwrap_err();
        assert!(matches!(err, DecodeError::BodyMismatch { op: 0, .. }));
    }

    #[test]
    fn test_unknown_op_and_garbage() {
        assert!(matches!(
            Signal::decode(r#"{"op":9}"#),
            Err(DecodeError::UnknownOp(9))
        ));
        assert!(matches!(
            Signal::decode("not json"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_event_body() {
        let text = r#"{"op":0,"body":{"id":3,"type":"message-created","platform":"discord",
            "self_id":"b","timestamp":1700000000000,
            "channel":{"id":"c","type":0},"user":{"id":"u"},
            "message":{"id":"m","content":"hi"}}}"#;
        let Signal::Event(body) = Signal::decode(text).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(body.id, 3);
        assert_eq!(body.event_type, "message-created");
        assert_eq!(body.message.unwrap().content, "hi");
    }
}
