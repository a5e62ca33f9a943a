use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub name: String,
    pub task: ScheduledTask,
    pub task_args: Value,
    pub schedule_type: ScheduleType,
    #[serde(with = "time::serde::rfc3339")]
    pub next_run: OffsetDateTime,
    /// Remaining runs; negative means forever.
    pub repeats: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    pub last_result: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledTask {
    ExpiringProducts,
    LowStock,
}

impl ScheduledTask {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "expiring_products" => Some(Self::ExpiringProducts),
            "low_stock" => Some(Self::LowStock),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::ExpiringProducts => "expiring_products",
            Self::LowStock => "low_stock",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    Once,
    Hourly,
    Daily,
    Weekly,
}

impl ScheduleType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "once" => Some(Self::Once),
            "hourly" => Some(Self::Hourly),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Once => None,
            Self::Hourly => Some(Duration::hours(1)),
            Self::Daily => Some(Duration::days(1)),
            Self::Weekly => Some(Duration::weeks(1)),
        }
    }

    /// First occurrence after `now`, stepping from `previous` in whole intervals
    /// so the configured time of day is preserved after downtime. `None` for
    /// one-off schedules.
    pub fn advance(&self, previous: OffsetDateTime, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let step = self.interval()?.whole_seconds();
        let elapsed = (now - previous).whole_seconds();
        let steps = (elapsed.div_euclid(step) + 1).max(1);
        Some(previous + Duration::seconds(step * steps))
    }
}

/// What happens to a schedule row once an occurrence has been claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRun {
    Reschedule { next_run: OffsetDateTime, repeats: i32 },
    Finish,
}

impl Schedule {
    /// One-off schedules and schedules that used their last repeat finish;
    /// the rest move to their next occurrence after `now`.
    pub fn after_run(&self, now: OffsetDateTime) -> AfterRun {
        let repeats = if self.repeats > 0 {
            self.repeats - 1
        } else {
            self.repeats
        };
        if repeats == 0 {
            return AfterRun::Finish;
        }
        match self.schedule_type.advance(self.next_run, now) {
            Some(next_run) => AfterRun::Reschedule { next_run, repeats },
            None => AfterRun::Finish,
        }
    }
}

/// Next `hour:minute` in `offset`: today if that moment is still ahead, else tomorrow.
pub fn next_daily_run(
    hour: u8,
    minute: u8,
    now: OffsetDateTime,
    offset: UtcOffset,
) -> Result<OffsetDateTime> {
    let time = Time::from_hms(hour, minute, 0)
        .map_err(|err| anyhow!("invalid schedule time: {}", err))?;
    let local_today = now.to_offset(offset).date();
    let candidate = local_today.with_time(time).assume_offset(offset);
    if candidate < now {
        Ok(candidate + Duration::days(1))
    } else {
        Ok(candidate)
    }
}
