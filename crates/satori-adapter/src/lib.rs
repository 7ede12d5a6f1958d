//! # Satori Adapter
//!
//! This crate implements the client side of the Satori chat-bot protocol.
//!
//! ## Overview
//!
//! - Markup parsing and rendering ([`model::element`], [`Message`], [`Segment`])
//! - Signaling frames and the event taxonomy ([`Signal`], [`Event`])
//! - Message preprocessing (reply extraction, mention detection)
//! - The bot API facade ([`SatoriBot`]) and its registry ([`BotRegistry`])
//! - Frame handling for every serve mode ([`SatoriAdapter`])
//! - The WebSocket state machine ([`SatoriConnection`])
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use satori_adapter::{AdapterConfig, SatoriAdapter, SatoriConnection};
//! use satori_transport::{ReqwestClient, TungsteniteConnector};
//!
//! let adapter = Arc::new(SatoriAdapter::new(
//!     AdapterConfig::default(),
//!     Arc::new(ReqwestClient::new()?),
//!     my_sink,
//! ));
//! let handle = SatoriConnection::new(adapter, Arc::new(TungsteniteConnector::new())).spawn();
//! handle.join().await?;
//! ```
//!
//! ## Event Hierarchy
//!
//! ```text
//! Event { id, platform, self_id, timestamp, operator }
//! └── EventKind
//!     ├── Guild*, GuildMember*, GuildRole*
//!     ├── Login{Added, Removed, Updated}
//!     ├── Message{Created, Updated, Deleted}
//!     ├── Reaction{Added, Removed}
//!     ├── FriendRequest
//!     └── Internal
//! ```
//!
//! ## Markup
//!
//! ```rust,ignore
//! use satori_adapter::{Message, Segment};
//!
//! let msg = Message::parse(r#"<at id="42"/> hi <b>there</b>"#);
//! assert_eq!(msg.len(), 3);
//! let reply = Segment::quote("m1") + "got it" + Segment::at("42");
//! assert_eq!(reply.to_string(), r#"<quote id="m1"/>got it<at id="42"/>"#);
//! ```

pub mod adapter;
pub mod bot;
pub mod config;
pub mod connection;
pub mod model;
pub mod preprocess;
pub mod registry;
pub mod traits;

pub use adapter::{ADAPTER_NAME, SatoriAdapter};
pub use bot::{SatoriBot, SendOptions};
pub use config::{Account, AdapterConfig, ServeMode};
pub use connection::{ConnectionHandle, ConnectionPhase, SatoriConnection};
pub use preprocess::{check_at_me, check_reply, preprocess};
pub use registry::BotRegistry;
pub use traits::EventSink;

// Re-export model types
pub use model::element::{self, AttrValue, Element};
pub use model::event::{Event, EventKind, MessageEvent};
pub use model::message::Message;
pub use model::segment::{MediaSource, Segment, Style};
pub use model::signal::{Opcode, Signal};
pub use model::types::{
    Channel, ChannelType, Guild, GuildMember, GuildRole, Login, LoginStatus, Pagination, User,
    WireMessage,
};
