//! Satori Runtime - configuration, logging and serve modes.
//!
//! This crate provides:
//! - Layered configuration loading ([`ConfigLoader`], [`SatoriConfig`])
//! - Logging setup over `tracing-subscriber` ([`LoggingBuilder`])
//! - Serving every configured endpoint in WebSocket, WebHook or Dev mode
//!   ([`SatoriRuntime`])
//!
//! # Transports
//!
//! The transports compiled into the runtime follow the cargo features:
//!
//! - `ws-client`: WebSocket gateway connections (`websocket`, `dev`)
//! - `http-client`: API calls and Dev mode forwarding
//! - `http-server`: the webhook listener (`webhook`)
//! - `full-transport` *(default)*: all of the above
//!
//! ```rust,ignore
//! use satori_runtime::SatoriRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = SatoriRuntime::new();
//!     let dispatcher = runtime.dispatcher().plugin(my_plugin()).build();
//!     runtime.run(dispatcher).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, SatoriConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeBuilder, SatoriRuntime, wait_for_shutdown};

// Re-export tracing for use by plugins
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugins.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
