//! # Satori
//!
//! A client for the Satori chat-bot protocol with a small plugin framework.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  frames  ┌───────────────┐  events  ┌────────────┐
//! │  Gateway  │─────────▶│ SatoriAdapter │─────────▶│ Dispatcher │──▶ handlers (own task)
//! │ (WS/HTTP) │◀─────────│  + BotRegistry│          │ ban/admin  │
//! └───────────┘   API    └───────────────┘          └────────────┘
//! ```
//!
//! - **Runtime**: loads `satori.toml`, sets up logging, serves each endpoint
//! - **Adapter**: signaling, markup, events, the [`SatoriBot`](prelude::SatoriBot) facade
//! - **Dispatcher**: built-in commands, bans, bounded concurrent handlers
//! - **Scheduler**: interval and cron-style jobs per connected bot
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use satori::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SatoriRuntime::new();
//!
//!     let echo = Plugin::new("回声", "plugin_echo").handler(
//!         Handler::new("echo", |bot, event| async move {
//!             let message = event.message()?.clone();
//!             bot.send(&event, message, SendOptions::default()).await?;
//!             Ok(())
//!         })
//!         .command("/echo "),
//!     );
//!
//!     runtime.run(runtime.dispatcher().plugin(echo).build()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)* / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `full-transport` *(default)*: WebSocket client, HTTP client and webhook server

pub use satori_adapter as adapter;
pub use satori_core as core;
pub use satori_framework as framework;
pub use satori_runtime as runtime;
pub use satori_transport as transport;

/// Commonly used types for building bots.
///
/// ```rust,ignore
/// use satori::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use satori_runtime::{SatoriConfig, SatoriRuntime};

    // Plugins and scheduling
    pub use satori_framework::{
        CronField, Dispatcher, Handler, Plugin, Schedule, Scheduler,
    };

    // Bot facade and events
    pub use satori_adapter::{Event, EventKind, Message, SatoriBot, Segment, SendOptions};

    // Errors seen by handlers
    pub use satori_core::{ApiError, EventError};
}
