//! Registry of logged-in bots.
//!
//! There is at most one [`SatoriBot`] per `self_id`. Bots join when a Ready
//! frame, a `login-added`/`login-updated` event or a webhook verification
//! reveals them, and leave on `login-removed`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bot::SatoriBot;

/// Bots by `self_id`.
#[derive(Debug, Default)]
pub struct BotRegistry {
    bots: RwLock<HashMap<String, Arc<SatoriBot>>>,
}

impl BotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bot unless one with the same `self_id` already exists.
    ///
    /// Returns the newly registered bot, or `None` when the id was taken.
    pub fn register(&self, bot: SatoriBot) -> Option<Arc<SatoriBot>> {
        let mut bots = self.bots.write();
        if bots.contains_key(bot.self_id()) {
            return None;
        }
        let bot = Arc::new(bot);
        bots.insert(bot.self_id().to_string(), Arc::clone(&bot));
        Some(bot)
    }

    /// Gets a bot by `self_id`.
    pub fn get(&self, self_id: &str) -> Option<Arc<SatoriBot>> {
        self.bots.read().get(self_id).cloned()
    }

    pub fn contains(&self, self_id: &str) -> bool {
        self.bots.read().contains_key(self_id)
    }

    /// Removes a bot.
    pub fn unregister(&self, self_id: &str) -> Option<Arc<SatoriBot>> {
        self.bots.write().remove(self_id)
    }

    /// Returns the ids of all registered bots.
    pub fn ids(&self) -> Vec<String> {
        self.bots.read().keys().cloned().collect()
    }

    /// Returns all registered bots.
    pub fn bots(&self) -> Vec<Arc<SatoriBot>> {
        self.bots.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::tests::{MockHttp, test_bot};

    #[test]
    fn test_one_bot_per_id() {
        let registry = BotRegistry::new();
        let http = MockHttp::new(200, "");

        assert!(registry.register(test_bot(http.clone())).is_some());
        assert!(registry.register(test_bot(http)).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.ids(), vec!["bot".to_string()]);
    }

    #[test]
    fn test_unregister() {
        let registry = BotRegistry::new();
        registry.register(test_bot(MockHttp::new(200, "")));

        assert!(registry.contains("bot"));
        assert!(registry.unregister("bot").is_some());
        assert!(registry.get("bot").is_none());
        assert!(registry.unregister("bot").is_none());
        assert!(registry.is_empty());
    }
}
