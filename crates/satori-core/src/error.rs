//! Unified error types for the Satori client.
//!
//! Every layer reports failures through one of the enums below. The
//! propagation policy is local handling: decode and event errors are logged
//! by whoever receives them, transport errors feed the reconnect logic, and
//! only configuration errors are allowed to stop the process at startup.

use thiserror::Error;

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors raised while opening, using or closing a transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {url} - {reason}")]
    ConnectionFailed {
        /// The URL that failed to connect.
        url: String,
        /// Reason for failure.
        reason: String,
    },

    /// Connection closed.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Message send failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Transport not compiled in or not registered.
    #[error("transport '{transport}' not available")]
    NotAvailable {
        /// The transport type that's not available.
        transport: &'static str,
    },

    /// Invalid configuration.
    #[error("invalid transport configuration: {0}")]
    InvalidConfig(String),

    /// An inbound payload was rejected by its handler.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors raised while turning a raw frame into a signaling value or event.
///
/// A decode error never crosses the frame boundary: the frame is dropped and
/// the connection keeps running.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON or does not match the expected shape.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The `op` code is outside the known signaling set.
    #[error("unknown signaling op: {0}")]
    UnknownOp(i64),

    /// The body does not match the shape required by its `op`.
    #[error("body does not match op {op}: {reason}")]
    BodyMismatch {
        /// The declared op code.
        op: i64,
        /// Why the body was rejected.
        reason: String,
    },

    /// The event `type` string has no registered variant.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A field required by the event variant is absent.
    #[error("event '{event_type}' is missing required field '{field}'")]
    MissingField {
        /// The wire event type.
        event_type: String,
        /// The missing field.
        field: &'static str,
    },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

// =============================================================================
// Event Errors
// =============================================================================

/// A handler asked an event for a field it does not carry.
///
/// These are the "unaddressable event" failures. They are expected and the
/// caller decides what they mean (the ban filter treats them as "not banned").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The event has no user.
    #[error("event '{0}' has no user id")]
    NoUserId(String),

    /// The event has no guild.
    #[error("event '{0}' has no guild id")]
    NoGuildId(String),

    /// The event has no message.
    #[error("event '{0}' has no message")]
    NoMessage(String),

    /// The event has no channel to reply into.
    #[error("event '{0}' cannot be replied to")]
    NoChannel(String),
}

// =============================================================================
// API Errors
// =============================================================================

/// Classification of a non-2xx HTTP API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 400
    BadRequest,
    /// 401
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 5xx
    ServerError,
    /// Anything else outside 2xx.
    Unknown,
}

impl ApiErrorKind {
    /// Maps an HTTP status to an error kind, or `None` for 2xx.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            405 => Some(Self::MethodNotAllowed),
            500..=599 => Some(Self::ServerError),
            _ => Some(Self::Unknown),
        }
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::BadRequest => "bad request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::MethodNotAllowed => "method not allowed",
            Self::ServerError => "server error",
            Self::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

/// Error type for outbound API calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    #[error("API {api} failed with {kind} ({status})")]
    Status {
        /// Name of the API method.
        api: String,
        /// Error classification.
        kind: ApiErrorKind,
        /// Raw HTTP status.
        status: u16,
    },

    /// No HTTP client is available for this bot.
    #[error("bot is not connected")]
    NotConnected,

    /// Failed to serialize/deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The event cannot be used for the requested call.
    #[error(transparent)]
    Event(#[from] EventError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// Returns the error kind when the failure came from a response status.
    pub fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Status { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors that stop an adapter (connection) as a whole.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Required connection settings are absent; fatal at startup.
    #[error("handshake configuration missing: {0}")]
    Handshake(String),

    /// The reconnect budget ran out; the connection is abandoned.
    #[error("connection abandoned after {attempts} reconnect attempts")]
    RetryExhausted {
        /// Number of reconnect attempts that were made.
        attempts: u32,
    },

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),

    /// Decode error.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Transport error.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Result type for decoding.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for event accessors.
pub type EventResult<T> = Result<T, EventError>;

/// Result type for API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
