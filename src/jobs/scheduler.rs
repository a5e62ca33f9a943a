use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::schedule::{Schedule, ScheduledTask};

const ERROR_BACKOFF_SECONDS: u64 = 5;

/// Runs a scheduled task and returns its summary line.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: ScheduledTask, args: &Value) -> Result<String>;
}

/// Persistence the worker loop needs from the schedule table.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn due(&self, now: OffsetDateTime) -> Result<Vec<Schedule>>;
    /// Advances or removes the schedule; false when another worker got there first.
    async fn claim(&self, schedule: &Schedule, now: OffsetDateTime) -> Result<bool>;
    async fn record_result(
        &self,
        schedule_id: Uuid,
        ran_at: OffsetDateTime,
        result: &str,
    ) -> Result<()>;
}

/// Polls for due schedules until `shutdown` flips to true.
///
/// Shutdown is only observed between polls: a claimed schedule always runs
/// to completion and has its result stored before this returns.
pub async fn run(
    schedules: Arc<dyn ScheduleStore>,
    executor: Arc<dyn TaskExecutor>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    info!(poll_seconds = poll_interval.as_secs(), "scheduler started");
    loop {
        let pause = match run_due(schedules.as_ref(), executor.as_ref(), OffsetDateTime::now_utc())
            .await
        {
            Ok(0) => poll_interval,
            Ok(ran) => {
                debug!(ran, "scheduler tick finished");
                poll_interval
            }
            Err(err) => {
                warn!(error = ?err, "scheduler poll failed, backing off");
                poll_interval + Duration::from_secs(ERROR_BACKOFF_SECONDS)
            }
        };

        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            changed = shutdown.changed() => {
                // A dropped sender counts as shutdown too.
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("scheduler stopped");
    Ok(())
}

/// Runs every schedule due at `now` that this worker manages to claim.
pub async fn run_due(
    schedules: &dyn ScheduleStore,
    executor: &dyn TaskExecutor,
    now: OffsetDateTime,
) -> Result<usize> {
    let due = schedules.due(now).await?;
    let mut ran = 0;
    for schedule in due {
        if !schedules.claim(&schedule, now).await? {
            debug!(schedule_id = %schedule.id, "schedule claimed by another worker");
            continue;
        }
        let result = execute_schedule(executor, &schedule).await;
        if let Err(err) = schedules
            .record_result(schedule.id, OffsetDateTime::now_utc(), &result)
            .await
        {
            error!(error = ?err, schedule_id = %schedule.id, "failed to store schedule result");
        }
        ran += 1;
    }
    Ok(ran)
}

/// Task failures become the stored result instead of an error.
pub async fn execute_schedule(executor: &dyn TaskExecutor, schedule: &Schedule) -> String {
    info!(
        schedule_id = %schedule.id,
        name = %schedule.name,
        task = schedule.task.as_db(),
        "running scheduled task"
    );
    match executor.execute(schedule.task, &schedule.task_args).await {
        Ok(result) => {
            info!(schedule_id = %schedule.id, result = %result, "scheduled task finished");
            result
        }
        Err(err) => {
            error!(error = ?err, schedule_id = %schedule.id, "scheduled task failed");
            format!("Erro: {}", err)
        }
    }
}
