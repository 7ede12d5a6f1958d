//! # Satori Framework
//!
//! Plugin-level building blocks for Satori bots.
//!
//! This layer provides:
//! - Plugins and handlers with command and mention filters
//! - The dispatch pipeline: built-in commands, bans, concurrent handlers
//! - Persistent ban and admin lists under the data directory
//! - Interval and cron-like schedules bound to each bot
//!
//! ## Built-in commands
//!
//! | Command | Who | Effect |
//! |---------|-----|--------|
//! | `/admin ID`, `/admin show`, `/deadmin ID` | host | manage admins |
//! | `/ban ...`, `/unban ...` | host, admins | manage bans |
//! | `/help`, `/help NAME` | anyone | plugin and handler help |
//! | `/reload` | host | restart this bot's schedules |

pub mod admin;
pub mod ban;
pub(crate) mod commands;
pub mod dispatcher;
pub mod error;
pub mod plugin;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use admin::AdminStore;
pub use ban::{BanInfo, BanStore, BanTarget};
pub use dispatcher::{DEFAULT_MAX_CONCURRENCY, Dispatcher, DispatcherBuilder};
pub use error::{FrameworkError, FrameworkResult};
pub use plugin::{Handler, HandlerFn, Plugin, PluginSet};
pub use scheduler::{CronField, JobFn, Schedule, Scheduler, Trigger};
pub use store::JsonFile;
