//! Event dispatcher for the Satori framework.
//!
//! The [`Dispatcher`] is the adapter's [`EventSink`]. Every event is handled
//! on its own task; at most `max_concurrency` events are in flight, further
//! dispatches wait for a slot:
//!
//! 1. The event's log line is written and message events are preprocessed
//!    (reply extraction, mention detection)
//! 2. `/admin` from the host and `/ban` from the host or an admin are
//!    answered and stop there
//! 3. Events from banned platforms, guilds and users are dropped
//! 4. `/help` and `/reload` are answered
//! 5. Every handler whose filters pass runs on its own task once a handler
//!    permit is free; errors and panics are logged per handler
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder()
//!     .data_dir("data")
//!     .plugin(echo_plugin())
//!     .schedule(timer_schedule())
//!     .max_concurrency(32)
//!     .build();
//! let adapter = SatoriAdapter::new(config, http, Arc::new(dispatcher));
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use satori_adapter::element::unescape;
use satori_adapter::{Event, EventSink, SatoriBot, SendOptions, preprocess};

use crate::admin::AdminStore;
use crate::ban::{BanInfo, BanStore};
use crate::commands::{admin_command, ban_command, help_overview, help_plugin};
use crate::plugin::{Plugin, PluginSet};
use crate::scheduler::{Schedule, Scheduler};

/// Default bound on in-flight events and on running handlers.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

struct Shared {
    plugins: PluginSet,
    scheduler: Scheduler,
    bans: BanStore,
    admins: AdminStore,
    semaphore: Arc<Semaphore>,
    event_slots: Arc<Semaphore>,
}

/// Routes events to plugins. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

/// Builder for [`Dispatcher`].
#[derive(Debug)]
pub struct DispatcherBuilder {
    data_dir: PathBuf,
    max_concurrency: usize,
    plugins: PluginSet,
    scheduler: Scheduler,
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            plugins: PluginSet::new(),
            scheduler: Scheduler::new(),
        }
    }
}

impl DispatcherBuilder {
    /// Directory holding `ban_info.json` and `admin.json`.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.add(plugin);
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.scheduler.add(schedule);
        self
    }

    pub fn build(self) -> Dispatcher {
        info!(
            plugins = self.plugins.len(),
            schedules = self.scheduler.len(),
            data_dir = %self.data_dir.display(),
            "Dispatcher ready"
        );
        Dispatcher {
            shared: Arc::new(Shared {
                bans: BanStore::open(&self.data_dir),
                admins: AdminStore::open(&self.data_dir),
                plugins: self.plugins,
                scheduler: self.scheduler,
                semaphore: Arc::new(Semaphore::new(self.max_concurrency)),
                event_slots: Arc::new(Semaphore::new(self.max_concurrency)),
            }),
        }
    }
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.shared.plugins
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    pub fn bans(&self) -> &BanStore {
        &self.shared.bans
    }

    pub fn admins(&self) -> &AdminStore {
        &self.shared.admins
    }

    /// Stops every schedule.
    pub fn shutdown(&self) {
        self.shared.scheduler.kill();
    }

    /// Runs the whole pipeline for one event.
    ///
    /// Returns the number of handlers invoked, after all of them finished.
    pub async fn handle(&self, bot: Arc<SatoriBot>, mut event: Event) -> usize {
        info!(self_id = %bot.self_id(), "{}", event.log_line());
        preprocess(&mut event, bot.user_id());

        let user_id = event.user_id().ok().map(str::to_string);
        let is_host = user_id.as_deref().is_some_and(|id| bot.is_host(id));
        let text = event.message().ok().map(ToString::to_string);

        if let Some(text) = &text {
            if is_host && (text.starts_with("/admin") || text.starts_with("/deadmin")) {
                if let Some(reply) = admin_command(&self.shared.admins, &event).await {
                    self.reply(&bot, &event, reply).await;
                }
                return 0;
            }
            if (text.starts_with("/ban") || text.starts_with("/unban"))
                && (is_host || self.is_admin(user_id.as_deref()).await)
            {
                if let Some(reply) =
                    ban_command(&self.shared.bans, &self.shared.plugins, &event).await
                {
                    self.reply(&bot, &event, reply).await;
                }
                return 0;
            }
        }

        let bans = match self.shared.bans.info().await {
            Ok(info) => info,
            Err(e) => {
                warn!(error = %e, "Failed to read ban list");
                BanInfo::default()
            }
        };
        if is_banned(&bans, &event) {
            debug!(event_type = event.event_type(), "Event from banned source dropped");
            return 0;
        }

        if let Some(text) = &text {
            if text.starts_with("/help") {
                self.help(&bot, &event, &bans, text).await;
                return 0;
            }
            if is_host && text.to_lowercase() == "/reload" {
                self.shared.scheduler.run(bot.clone());
                self.reply(&bot, &event, "<√> 插件已更新。".to_string())
                    .await;
                return 0;
            }
        }

        self.run_handlers(bot, event, &bans).await
    }

    async fn is_admin(&self, user_id: Option<&str>) -> bool {
        let Some(user_id) = user_id else {
            return false;
        };
        self.shared
            .admins
            .is_admin(user_id)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read admin list");
                false
            })
    }

    async fn help(&self, bot: &SatoriBot, event: &Event, bans: &BanInfo, text: &str) {
        let plugins = &self.shared.plugins;
        if text == "/help" {
            let banned = event
                .guild_id()
                .map(|guild| bans.plugins_in(guild))
                .unwrap_or_default();
            self.reply(bot, event, help_overview(plugins, banned)).await;
            return;
        }

        let query = unescape(text["/help".len()..].trim());
        if let Some(plugin) = plugins.find_plugin(&query) {
            self.reply(bot, event, help_plugin(plugin)).await;
            return;
        }
        for handler in plugins.iter().flat_map(Plugin::handlers) {
            if let Some(reply) = handler.help_reply(&query) {
                self.reply(bot, event, reply).await;
            }
        }
    }

    async fn run_handlers(&self, bot: Arc<SatoriBot>, event: Event, bans: &BanInfo) -> usize {
        let guild = event.guild_id().ok();
        let mut names = Vec::new();
        let mut tasks = Vec::new();

        for plugin in &self.shared.plugins {
            if guild.is_some_and(|g| bans.plugins_in(g).iter().any(|p| p == plugin.package_name()))
            {
                continue;
            }
            for handler in plugin.handlers() {
                if guild.is_some_and(|g| bans.functions_in(g).iter().any(|f| f == handler.inner_name()))
                {
                    continue;
                }
                let Some(prepared) = handler.prepare(&event) else {
                    continue;
                };

                let Ok(permit) = self.shared.semaphore.clone().acquire_owned().await else {
                    continue;
                };
                let name = handler.inner_name().to_string();
                let future = handler.call(bot.clone(), prepared);
                let task_name = name.clone();
                tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = future.await {
                        error!(handler = %task_name, "[{task_name}] 运行出错: {e:#}");
                    }
                }));
                names.push(name);
            }
        }

        let count = tasks.len();
        for (name, result) in names.iter().zip(join_all(tasks).await) {
            if let Err(e) = result {
                error!(handler = %name, "[{name}] 运行出错: {e}");
            }
        }
        count
    }

    async fn reply(&self, bot: &SatoriBot, event: &Event, text: String) {
        if let Err(e) = bot.send(event, text, SendOptions::default()).await {
            warn!(self_id = %bot.self_id(), error = %e, "Failed to send reply");
        }
    }
}

fn is_banned(bans: &BanInfo, event: &Event) -> bool {
    bans.platform.contains(&event.platform)
        || event
            .guild_id()
            .is_ok_and(|guild| bans.guild.iter().any(|g| g == guild))
        || event
            .user_id()
            .is_ok_and(|user| bans.user.iter().any(|u| u == user))
}

#[async_trait]
impl EventSink for Dispatcher {
    async fn dispatch(&self, bot: Arc<SatoriBot>, event: Event) {
        let Ok(slot) = self.shared.event_slots.clone().acquire_owned().await else {
            return;
        };
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let _slot = slot;
            dispatcher.handle(bot, event).await;
        });
    }

    async fn on_bot_ready(&self, bot: Arc<SatoriBot>) {
        self.shared.scheduler.run(bot);
    }

    async fn on_bot_removed(&self, self_id: &str) {
        self.shared.scheduler.kill_bot(self_id);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("plugins", &self.shared.plugins.len())
            .field("schedules", &self.shared.scheduler.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Notify;
    use tokio::task::yield_now;
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;
    use crate::ban::BanTarget;
    use crate::plugin::Handler;
    use crate::testing::{MockHttp, message_event, notice_event, test_bot};

    fn counting(ident: &str, counter: Arc<AtomicUsize>) -> Handler {
        Handler::new(ident, move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn dispatcher(dir: &tempfile::TempDir, plugin: Plugin) -> Dispatcher {
        Dispatcher::builder()
            .data_dir(dir.path())
            .max_concurrency(2)
            .plugin(plugin)
            .build()
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_run_once_despite_panic_and_sleep() {
        let dir = tempfile::tempdir().unwrap();
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));
        let panicking = Arc::new(AtomicUsize::new(0));

        let slow_counter = slow.clone();
        let panic_counter = panicking.clone();
        let plugin = Plugin::new("test", "plugin_test")
            .handler(counting("fast", fast.clone()))
            .handler(Handler::new("slow", move |_, _| {
                let counter = slow_counter.clone();
                async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }))
            .handler(Handler::new("boom", move |_, _| {
                let counter = panic_counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    panic!("handler failure");
                }
            }));

        let dispatcher = dispatcher(&dir, plugin);
        let http = Arc::new(MockHttp::default());
        let ran = dispatcher
            .handle(test_bot(http), message_event("hello", "u1"))
            .await;

        assert_eq!(ran, 3);
        assert_eq!(fast.load(Ordering::SeqCst), 1);
        assert_eq!(slow.load(Ordering::SeqCst), 1);
        assert_eq!(panicking.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_errors_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let plugin = Plugin::new("test", "plugin_test")
            .handler(Handler::new("fails", |_, _| async {
                anyhow::bail!("nope")
            }))
            .handler(counting("ok", count.clone()));

        let dispatcher = dispatcher(&dir, plugin);
        let bot = test_bot(Arc::new(MockHttp::default()));
        assert_eq!(dispatcher.handle(bot, message_event("x", "u1")).await, 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mention_reaches_to_me_handler() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let plugin = Plugin::new("test", "plugin_test")
            .handler(counting("greet", count.clone()).to_me());

        let dispatcher = dispatcher(&dir, plugin);
        let bot = test_bot(Arc::new(MockHttp::default()));
        dispatcher
            .handle(bot.clone(), message_event("hello", "u1"))
            .await;
        dispatcher
            .handle(bot, message_event("<at id=\"bot\"/> hello", "u1"))
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_message_events_reach_plain_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let plain = Arc::new(AtomicUsize::new(0));
        let command = Arc::new(AtomicUsize::new(0));
        let plugin = Plugin::new("test", "plugin_test")
            .handler(counting("plain", plain.clone()))
            .handler(counting("cmd", command.clone()).command("/cmd"));

        let dispatcher = dispatcher(&dir, plugin);
        let bot = test_bot(Arc::new(MockHttp::default()));
        assert_eq!(dispatcher.handle(bot, notice_event()).await, 1);
        assert_eq!(plain.load(Ordering::SeqCst), 1);
        assert_eq!(command.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_admin_command_is_host_only() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(&dir, Plugin::new("test", "plugin_test"));
        let http = Arc::new(MockHttp::default());
        let bot = test_bot(http.clone());

        dispatcher
            .handle(bot.clone(), message_event("/admin 42", "u1"))
            .await;
        assert!(dispatcher.admins().list().await.unwrap().is_empty());
        assert!(http.sent().is_empty());

        dispatcher
            .handle(bot, message_event("/admin 42", "owner"))
            .await;
        assert!(dispatcher.admins().is_admin("42").await.unwrap());
        assert_eq!(
            http.sent(),
            vec!["&lt;√&gt; 已将用户 42 设置为管理员。".to_string()]
        );
    }

    #[tokio::test]
    async fn test_admin_may_ban_and_banned_users_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(
            &dir,
            Plugin::new("test", "plugin_test").handler(counting("any", count.clone())),
        );
        let bot = test_bot(Arc::new(MockHttp::default()));
        dispatcher.admins().add("42").await;

        dispatcher
            .handle(bot.clone(), message_event("/ban 10086", "42"))
            .await;
        assert!(
            dispatcher
                .bans()
                .is_target_banned(BanTarget::User, "10086")
                .await
                .unwrap()
        );

        let ran = dispatcher
            .handle(bot.clone(), message_event("hi", "10086"))
            .await;
        assert_eq!(ran, 0);

        let ran = dispatcher.handle(bot, message_event("hi", "7")).await;
        assert_eq!(ran, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_banned_plugin_is_skipped_in_guild() {
        let dir = tempfile::tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher(
            &dir,
            Plugin::new("test", "plugin_test").handler(counting("any", count.clone())),
        );
        dispatcher
            .bans()
            .ban(dispatcher.plugins(), "c1", "plugin_test")
            .await;

        let bot = test_bot(Arc::new(MockHttp::default()));
        assert_eq!(dispatcher.handle(bot, message_event("hi", "u1")).await, 0);
    }

    #[tokio::test]
    async fn test_help() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = Plugin::new("回声", "plugin_echo")
            .doc("重复所发送的内容")
            .handler(Handler::new("echo", |_, _| async { Ok(()) }).help("/echo 内容"));
        let dispatcher = dispatcher(&dir, plugin);
        let http = Arc::new(MockHttp::default());
        let bot = test_bot(http.clone());

        dispatcher
            .handle(bot.clone(), message_event("/help", "u1"))
            .await;
        dispatcher
            .handle(bot.clone(), message_event("/help echo", "u1"))
            .await;
        dispatcher
            .handle(bot, message_event("/help unknown", "u1"))
            .await;

        let sent = http.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].starts_with("Bot 可用的插件有：\n&gt;&gt; 回声: 重复所发送的内容"));
        assert!(sent[0].ends_with("发送 /help + 名称 获取对应帮助。"));
        assert_eq!(sent[1], "[echo]\n/echo 内容");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_restarts_schedules() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::builder()
            .data_dir(dir.path())
            .schedule(Schedule::interval(
                "tick",
                Duration::from_secs(60),
                |_| async { Ok(()) },
            ))
            .build();
        let http = Arc::new(MockHttp::default());
        let bot = test_bot(http.clone());

        dispatcher
            .handle(bot.clone(), message_event("/reload", "u1"))
            .await;
        assert!(!dispatcher.scheduler().is_running("bot"));

        dispatcher
            .handle(bot, message_event("/RELOAD", "owner"))
            .await;
        assert!(dispatcher.scheduler().is_running("bot"));
        assert_eq!(http.sent(), vec!["&lt;√&gt; 插件已更新。".to_string()]);
        dispatcher.shutdown();
    }

    #[tokio::test]
    async fn test_sink_lifecycle_controls_schedules() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Dispatcher::builder()
            .data_dir(dir.path())
            .schedule(Schedule::interval(
                "tick",
                Duration::from_secs(60),
                |_| async { Ok(()) },
            ))
            .build();
        let bot = test_bot(Arc::new(MockHttp::default()));

        dispatcher.on_bot_ready(bot).await;
        assert!(dispatcher.scheduler().is_running("bot"));
        dispatcher.on_bot_removed("bot").await;
        assert!(!dispatcher.scheduler().is_running("bot"));
    }

    #[tokio::test]
    async fn test_dispatch_waits_for_a_free_slot() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Notify::new());
        let started = Arc::new(AtomicUsize::new(0));

        let handler_gate = gate.clone();
        let handler_started = started.clone();
        let plugin = Plugin::new("test", "plugin_test").handler(Handler::new(
            "wait",
            move |_, _| {
                let gate = handler_gate.clone();
                let started = handler_started.clone();
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(())
                }
            },
        ));
        let dispatcher = Dispatcher::builder()
            .data_dir(dir.path())
            .max_concurrency(1)
            .plugin(plugin)
            .build();
        let bot = test_bot(Arc::new(MockHttp::default()));

        dispatcher
            .dispatch(bot.clone(), message_event("first", "u1"))
            .await;
        let mut second = task::spawn(dispatcher.dispatch(bot, message_event("second", "u1")));
        assert_pending!(second.poll());

        while started.load(Ordering::SeqCst) == 0 {
            yield_now().await;
        }
        assert_pending!(second.poll());

        gate.notify_one();
        while !second.is_woken() {
            yield_now().await;
        }
        assert_ready!(second.poll());

        while started.load(Ordering::SeqCst) < 2 {
            yield_now().await;
        }
        gate.notify_one();
    }
}
