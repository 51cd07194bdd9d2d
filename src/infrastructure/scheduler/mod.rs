//! Cron-driven cleanup of expired status messages

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::errors::{StoreError, StoreResult};

/// Every day at midnight
pub const DEFAULT_CRON_TIME: &str = "0 0 * * *";

/// UTC+7 (Asia/Jakarta)
pub const DEFAULT_TIME_ZONE: &str = "+07:00";

/// When the job fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CronTime {
    /// Single run at a fixed instant
    At(DateTime<Utc>),
    /// Crontab expression; 5-field expressions are accepted
    Expression(String),
}

pub type CompletionHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct CronJobConfig {
    pub cron_time: CronTime,
    /// UTC offset such as `+07:00`, or `UTC`; defaults to [`DEFAULT_TIME_ZONE`]
    pub time_zone: Option<String>,
    /// Runs once the job stops
    pub on_complete: Option<CompletionHook>,
}

impl fmt::Debug for CronJobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CronJobConfig")
            .field("cron_time", &self.cron_time)
            .field("time_zone", &self.time_zone)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

impl Default for CronJobConfig {
    fn default() -> Self {
        Self {
            cron_time: CronTime::Expression(DEFAULT_CRON_TIME.to_string()),
            time_zone: Some(DEFAULT_TIME_ZONE.to_string()),
            on_complete: None,
        }
    }
}

impl CronJobConfig {
    pub fn expression(expr: impl Into<String>) -> Self {
        Self {
            cron_time: CronTime::Expression(expr.into()),
            ..Default::default()
        }
    }

    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            cron_time: CronTime::At(instant),
            ..Default::default()
        }
    }

    pub fn with_time_zone(mut self, tz: impl Into<String>) -> Self {
        self.time_zone = Some(tz.into());
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(hook));
        self
    }

    fn trigger(&self) -> StoreResult<Trigger> {
        let offset = parse_time_zone(self.time_zone.as_deref().unwrap_or(DEFAULT_TIME_ZONE))?;
        match self.cron_time {
            CronTime::At(instant) => Ok(Trigger::Once(instant)),
            CronTime::Expression(ref expr) => Ok(Trigger::Recurring {
                schedule: parse_schedule(expr)?,
                offset,
            }),
        }
    }

    /// First fire time strictly after `after`
    pub fn next_fire(&self, after: DateTime<Utc>) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.trigger()?.next_after(after))
    }
}

/// Whether status messages are purged on a schedule
#[derive(Debug, Clone, Default)]
pub enum AutoDeleteStatusMessage {
    #[default]
    Disabled,
    Enabled(CronJobConfig),
}

/// `true` enables the default schedule
impl From<bool> for AutoDeleteStatusMessage {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::Enabled(CronJobConfig::default())
        } else {
            Self::Disabled
        }
    }
}

impl From<CronJobConfig> for AutoDeleteStatusMessage {
    fn from(config: CronJobConfig) -> Self {
        Self::Enabled(config)
    }
}

enum Trigger {
    Once(DateTime<Utc>),
    Recurring { schedule: Schedule, offset: FixedOffset },
}

impl Trigger {
    fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Once(at) => (*at > after).then_some(*at),
            Trigger::Recurring { schedule, offset } => schedule
                .after(&after.with_timezone(offset))
                .next()
                .map(|t| t.with_timezone(&Utc)),
        }
    }

    fn is_once(&self) -> bool {
        matches!(self, Trigger::Once(_))
    }
}

/// Parse `UTC`, `Z` or a `+HH:MM` / `-HH:MM` offset
pub fn parse_time_zone(tz: &str) -> StoreResult<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| StoreError::Schedule("invalid offset".to_string()));
    }

    let invalid = || StoreError::Schedule(format!("invalid time zone '{}'", tz));
    let (sign, rest) = match tz.chars().next() {
        Some('+') => (1, &tz[1..]),
        Some('-') => (-1, &tz[1..]),
        _ => return Err(invalid()),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

/// Parse a cron expression; a leading seconds field is added to 5-field crontab lines
pub fn parse_schedule(expr: &str) -> StoreResult<Schedule> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| StoreError::Schedule(format!("invalid cron: {e}")))
}

/// Background task running a cleanup on a cron schedule
pub struct StatusCleanupJob {
    handle: JoinHandle<()>,
    on_complete: Option<CompletionHook>,
}

impl StatusCleanupJob {
    /// Validate the schedule and spawn the job on the current runtime
    pub fn start<F, Fut>(config: CronJobConfig, task: F) -> StoreResult<Self>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let trigger = config.trigger()?;
        let on_complete = config.on_complete.clone();
        let hook = config.on_complete.clone();

        tracing::info!(cron_time = ?config.cron_time, "Status cleanup job scheduled");

        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = trigger.next_after(now) else {
                    tracing::debug!("Status cleanup job has no upcoming run");
                    break;
                };

                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(wait).await;

                tracing::debug!(fired_at = %next, "Running status cleanup");
                task().await;

                if trigger.is_once() {
                    break;
                }
            }

            if let Some(hook) = hook {
                hook();
            }
        });

        Ok(Self {
            handle,
            on_complete,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the job and run its completion hook
    pub fn stop(self) {
        if self.handle.is_finished() {
            return;
        }
        self.handle.abort();
        if let Some(hook) = self.on_complete {
            hook();
        }
        tracing::info!("Status cleanup job stopped");
    }
}
