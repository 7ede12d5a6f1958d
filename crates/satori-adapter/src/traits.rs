//! Adapter-facing traits.
//!
//! The adapter decodes frames and owns the bot registry, but it does not
//! decide what happens to an event. That is the job of an [`EventSink`],
//! implemented by the framework's dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use crate::bot::SatoriBot;
use crate::model::event::Event;

/// Receives decoded events together with the bot they belong to.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Hands an event over for processing.
    ///
    /// Implementations must return promptly; long running work belongs on
    /// a spawned task.
    async fn dispatch(&self, bot: Arc<SatoriBot>, event: Event);

    /// Called once a bot has been registered.
    async fn on_bot_ready(&self, _bot: Arc<SatoriBot>) {}

    /// Called after a bot has been removed from the registry.
    async fn on_bot_removed(&self, _self_id: &str) {}
}
