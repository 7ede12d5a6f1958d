//! Configuration for the Satori runtime.
//!
//! The file layout mirrors the deployment: global settings at the top level
//! and one `[[satori]]` entry per gateway the bot connects to.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, SatoriConfig,
    SatoriEndpoint, SpanEventConfig, WebSocketSection, WebhookClientSection,
    WebhookServerSection,
};
