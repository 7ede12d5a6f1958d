//! Echo Bot Example
//!
//! Wires two plugins into the Satori runtime:
//!
//! - `回声`: `/echo <内容>` sends the content back
//! - `计时器`: `/timer <id>` starts a timer posting into the channel every
//!   five seconds, `/stoptimer <id>` stops it
//!
//! The built-in commands (`/help`, `/ban`, `/admin`, `/reload`) are
//! available as well.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-bot -- --config demos/echo_bot/satori.toml
//! cargo run --package echo-bot -- --serve dev
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

use satori::adapter::ServeMode;
use satori::prelude::*;
use satori::runtime::ConfigLoader;

#[derive(Debug, Parser)]
#[command(name = "echo-bot", about = "Echo and timer bot for Satori gateways")]
struct Args {
    /// Configuration file; searched in the current directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production, ...).
    #[arg(short, long)]
    profile: Option<String>,

    /// Overrides `serve` from the configuration.
    #[arg(short, long, value_enum)]
    serve: Option<Serve>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Serve {
    Websocket,
    Webhook,
    Dev,
}

impl From<Serve> for ServeMode {
    fn from(serve: Serve) -> Self {
        match serve {
            Serve::Websocket => ServeMode::WebSocket,
            Serve::Webhook => ServeMode::WebHook,
            Serve::Dev => ServeMode::Dev,
        }
    }
}

// ============================================================================
// Plugins
// ============================================================================

fn echo_plugin() -> Plugin {
    Plugin::new("回声", "plugin_echo")
        .doc("重复所发送的内容")
        .handler(
            Handler::new("echo", |bot, event| async move {
                let message = event.message()?.clone();
                bot.send(&event, message, SendOptions::default()).await?;
                Ok(())
            })
            .desc("重复所发送的内容。")
            .help("重复所发送的内容\n/echo <内容>")
            .command("/echo "),
        )
}

struct Timer {
    id: String,
    channel: String,
    last_fired: Instant,
}

type Timers = Arc<Mutex<Vec<Timer>>>;

const TIMER_PERIOD: Duration = Duration::from_secs(5);

fn timer_plugin(timers: Timers) -> Plugin {
    let start = timers.clone();
    let stop = timers;

    Plugin::new("计时器", "plugin_timer")
        .doc("计时器功能")
        .handler(
            Handler::new("timer", move |bot, event| {
                let timers = start.clone();
                async move {
                    let message = event.message()?;
                    if !message.is_text() {
                        return Ok(());
                    }
                    let id = message.extract_plain_text();
                    timers.lock().push(Timer {
                        id: id.clone(),
                        channel: event.guild_id()?.to_string(),
                        last_fired: Instant::now(),
                    });
                    bot.send(&event, format!("已添加计时器 {id}"), SendOptions::default())
                        .await?;
                    Ok(())
                }
            })
            .name("创建计时器")
            .desc("创建一个计时器")
            .help("创建一个计时器，将每隔五秒发送一条消息\n/timer <id> -> 创建一个拥有指定 id 的计时器")
            .command("/timer "),
        )
        .handler(
            Handler::new("stoptimer", move |bot, event| {
                let timers = stop.clone();
                async move {
                    let message = event.message()?;
                    if !message.is_text() {
                        return Ok(());
                    }
                    let id = message.extract_plain_text();
                    let removed = {
                        let mut timers = timers.lock();
                        let before = timers.len();
                        timers.retain(|t| t.id != id);
                        timers.len() != before
                    };
                    if removed {
                        bot.send(&event, format!("已停止计时器 {id}"), SendOptions::default())
                            .await?;
                    }
                    Ok(())
                }
            })
            .name("停止计时器")
            .desc("停止一个计时器")
            .help("停止一个计时器，将不再发送消息\n/stoptimer <id> -> 停止一个拥有指定 id 的计时器")
            .command("/stoptimer "),
        )
}

/// Posts into every channel whose timer is due.
fn timer_schedule(timers: Timers) -> Schedule {
    Schedule::interval("timer_run", Duration::from_secs(1), move |bot| {
        let timers = timers.clone();
        async move {
            let now = Instant::now();
            let due: Vec<String> = timers
                .lock()
                .iter_mut()
                .filter(|t| now.duration_since(t.last_fired) >= TIMER_PERIOD)
                .map(|t| {
                    t.last_fired = now;
                    t.channel.clone()
                })
                .collect();
            for channel in due {
                bot.message_create(&channel, "[计时器消息]").await?;
            }
            Ok(())
        }
    })
    .max_instance(1)
}

/// Logs the connected bot every day at 09:00.
fn morning_schedule() -> Schedule {
    Schedule::cron("morning", CronField::Hour, [9], |bot| async move {
        info!(self_id = %bot.self_id(), platform = %bot.platform(), "Good morning");
        Ok(())
    })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &args.profile {
        loader = loader.profile(profile);
    }
    let mut config = loader.load()?;
    if let Some(serve) = args.serve {
        config.serve = serve.into();
    }

    let runtime = SatoriRuntime::from_config(config);

    let timers = Timers::default();
    let dispatcher = runtime
        .dispatcher()
        .plugin(echo_plugin())
        .plugin(timer_plugin(timers.clone()))
        .schedule(timer_schedule(timers))
        .schedule(morning_schedule())
        .build();

    runtime.run(dispatcher).await?;
    Ok(())
}
