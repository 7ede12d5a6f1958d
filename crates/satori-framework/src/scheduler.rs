//! Recurring jobs run per bot.
//!
//! A [`Schedule`] fires either every fixed interval or whenever the local
//! clock's second, minute or hour field hits one of a list of values. The
//! [`Scheduler`] starts every schedule for a bot once it is ready and cancels
//! them when the bot goes away.
//!
//! ```rust,ignore
//! let tick = Schedule::interval("timer_run", Duration::from_secs(1), |bot| async move {
//!     bot.message_create("c1", "[计时器消息]").await?;
//!     Ok(())
//! })
//! .max_instance(1);
//! let hourly = Schedule::cron("report", CronField::Minute, [0, 30], report);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use satori_adapter::SatoriBot;

/// Type-erased job function.
pub type JobFn =
    Arc<dyn Fn(Arc<SatoriBot>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Clock field matched by a cron schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CronField {
    Second,
    Minute,
    Hour,
}

impl CronField {
    fn range(self) -> u32 {
        match self {
            Self::Second | Self::Minute => 60,
            Self::Hour => 24,
        }
    }

    fn unit(self) -> chrono::TimeDelta {
        match self {
            Self::Second => chrono::TimeDelta::seconds(1),
            Self::Minute => chrono::TimeDelta::minutes(1),
            Self::Hour => chrono::TimeDelta::hours(1),
        }
    }

    fn get(self, time: &NaiveDateTime) -> u32 {
        match self {
            Self::Second => time.second(),
            Self::Minute => time.minute(),
            Self::Hour => time.hour(),
        }
    }

    fn truncate(self, time: NaiveDateTime) -> Option<NaiveDateTime> {
        let time = time.with_nanosecond(0)?;
        match self {
            Self::Second => Some(time),
            Self::Minute => time.with_second(0),
            Self::Hour => time.with_second(0)?.with_minute(0),
        }
    }
}

/// When a schedule fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Interval(Duration),
    Cron(CronField, Vec<u32>),
}

/// First time strictly after `now` whose `field` is one of `values`.
pub fn next_fire(field: CronField, values: &[u32], now: NaiveDateTime) -> Option<NaiveDateTime> {
    let start = field.truncate(now)?;
    (1..=field.range())
        .map(|step| start + field.unit() * step as i32)
        .find(|candidate| values.contains(&field.get(candidate)))
}

/// A named recurring job.
#[derive(Clone)]
pub struct Schedule {
    name: String,
    trigger: Trigger,
    max_instance: Option<usize>,
    job: JobFn,
}

impl Schedule {
    fn with_trigger<F, Fut>(name: impl Into<String>, trigger: Trigger, job: F) -> Self
    where
        F: Fn(Arc<SatoriBot>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            trigger,
            max_instance: None,
            job: Arc::new(move |bot| Box::pin(job(bot))),
        }
    }

    /// Runs `job` every `period`, first after one period.
    pub fn interval<F, Fut>(name: impl Into<String>, period: Duration, job: F) -> Self
    where
        F: Fn(Arc<SatoriBot>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::with_trigger(name, Trigger::Interval(period), job)
    }

    /// Runs `job` whenever the local clock's `field` equals one of `values`.
    ///
    /// Values outside the field's range are dropped.
    pub fn cron<F, Fut>(
        name: impl Into<String>,
        field: CronField,
        values: impl IntoIterator<Item = u32>,
        job: F,
    ) -> Self
    where
        F: Fn(Arc<SatoriBot>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut values: Vec<u32> = values
            .into_iter()
            .filter(|v| *v < field.range())
            .collect();
        values.sort_unstable();
        values.dedup();
        Self::with_trigger(name, Trigger::Cron(field, values), job)
    }

    /// Caps the number of concurrently running instances.
    pub fn max_instance(mut self, max: usize) -> Self {
        self.max_instance = Some(max);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    async fn run(self: Arc<Self>, bot: Arc<SatoriBot>, token: CancellationToken) {
        let running = Arc::new(AtomicUsize::new(0));
        match self.trigger.clone() {
            Trigger::Interval(period) => {
                if period.is_zero() {
                    warn!(schedule = %self.name, "Interval is zero, schedule not started");
                    return;
                }
                let step =
                    chrono::TimeDelta::from_std(period).unwrap_or(chrono::TimeDelta::zero());
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {
                            self.fire(&bot, &running, || Local::now() + step);
                        }
                    }
                }
            }
            Trigger::Cron(field, values) => loop {
                let now = Local::now();
                let Some(next) = next_fire(field, &values, now.naive_local())
                    .and_then(|next| next.and_local_timezone(Local).earliest())
                else {
                    warn!(schedule = %self.name, "No matching time, schedule not started");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {
                        let following = next_fire(field, &values, next.naive_local())
                            .and_then(|t| t.and_local_timezone(Local).earliest())
                            .unwrap_or(next);
                        self.fire(&bot, &running, || following);
                    }
                }
            },
        }
        debug!(schedule = %self.name, self_id = %bot.self_id(), "Schedule stopped");
    }

    fn fire(
        &self,
        bot: &Arc<SatoriBot>,
        running: &Arc<AtomicUsize>,
        next: impl FnOnce() -> DateTime<Local>,
    ) {
        if self
            .max_instance
            .is_some_and(|max| running.load(Ordering::SeqCst) >= max)
        {
            info!(
                "任务 {} 的任务实例数达到最大值，将在 {} 再次尝试执行。",
                self.name,
                next().format("%Y-%m-%d %H:%M:%S")
            );
            return;
        }

        let guard = InstanceGuard::new(running.clone());
        let job = (self.job)(bot.clone());
        let name = self.name.clone();
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = job.await {
                error!(schedule = %name, error = %e, "[{name}] 运行出错");
            }
        });
    }
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("max_instance", &self.max_instance)
            .finish()
    }
}

/// Counts one running instance until dropped, even if the job panics.
struct InstanceGuard(Arc<AtomicUsize>);

impl InstanceGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Owns the schedules and the running instances per bot.
#[derive(Debug, Default)]
pub struct Scheduler {
    schedules: Vec<Arc<Schedule>>,
    running: Mutex<HashMap<String, CancellationToken>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, schedule: Schedule) {
        self.schedules.push(Arc::new(schedule));
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    /// Starts every schedule for `bot`, replacing any running set.
    pub fn run(&self, bot: Arc<SatoriBot>) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .running
            .lock()
            .insert(bot.self_id().to_string(), token.clone())
        {
            previous.cancel();
        }
        for schedule in &self.schedules {
            debug!(schedule = %schedule.name, self_id = %bot.self_id(), "Starting schedule");
            tokio::spawn(schedule.clone().run(bot.clone(), token.child_token()));
        }
    }

    /// Stops the schedules of one bot.
    pub fn kill_bot(&self, self_id: &str) {
        if let Some(token) = self.running.lock().remove(self_id) {
            token.cancel();
        }
    }

    /// Stops every schedule of every bot.
    pub fn kill(&self) {
        for (_, token) in self.running.lock().drain() {
            token.cancel();
        }
    }

    /// Whether schedules are running for `self_id`.
    pub fn is_running(&self, self_id: &str) -> bool {
        self.running.lock().contains_key(self_id)
    }
}
