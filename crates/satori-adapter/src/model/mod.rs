//! Data models for the Satori protocol.
//!
//! This module contains the markup engine, the wire resources, the signaling
//! frames and the event taxonomy.

pub mod element;
pub mod event;
pub mod message;
pub mod segment;
pub mod signal;
pub mod types;

pub use element::{AttrValue, Element, escape, unescape};
pub use event::{
    Event, EventKind, FriendRequestEvent, GuildEvent, GuildMemberEvent, GuildRoleEvent,
    InternalEvent, LoginEvent, MessageEvent, ReactionEvent,
};
pub use message::Message;
pub use segment::{
    AtData, AuthorData, MediaData, MediaSource, RenderData, Segment, SharpData, Style,
};
pub use signal::{EventBody, IdentifyBody, Opcode, ReadyBody, Signal};
pub use types::{
    Channel, ChannelType, Guild, GuildMember, GuildRole, Login, LoginStatus, Pagination, User,
    WireMessage,
};
