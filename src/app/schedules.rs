use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::{OffsetDateTime, UtcOffset};
use uuid::Uuid;

use crate::domain::schedule::{next_daily_run, AfterRun, Schedule, ScheduleType, ScheduledTask};
use crate::infra::db::Db;
use crate::jobs::scheduler::ScheduleStore;

const SCHEDULE_COLUMNS: &str = "SELECT id, name, task, task_args, schedule_type, next_run, repeats, \
            last_run_at, last_result, created_at \
     FROM schedules";

/// Settings for the two daily inventory checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultSchedules {
    pub hour: u8,
    pub minute: u8,
    pub min_quantity: i32,
}

impl Default for DefaultSchedules {
    fn default() -> Self {
        Self {
            hour: 9,
            minute: 0,
            min_quantity: 2,
        }
    }
}

#[derive(Clone)]
pub struct ScheduleService {
    db: Db,
}

impl ScheduleService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!("{} ORDER BY next_run ASC, name ASC", SCHEDULE_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    pub async fn get(&self, schedule_id: Uuid) -> Result<Option<Schedule>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", SCHEDULE_COLUMNS))
            .bind(schedule_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(schedule_from_row).transpose()
    }

    pub async fn delete(&self, schedule_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(schedule_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replaces every schedule of both tasks with one daily run each, starting
    /// at the next `hour:minute` in `offset`.
    pub async fn recreate_defaults(
        &self,
        settings: DefaultSchedules,
        offset: UtcOffset,
        now: OffsetDateTime,
    ) -> Result<Vec<Schedule>> {
        if settings.min_quantity < 1 {
            return Err(anyhow!("min_quantity must be at least 1"));
        }
        let next_run = next_daily_run(settings.hour, settings.minute, now, offset)?;

        let mut tx = self.db.pool().begin().await?;
        let removed = sqlx::query("DELETE FROM schedules WHERE task IN ($1, $2)")
            .bind(ScheduledTask::ExpiringProducts.as_db())
            .bind(ScheduledTask::LowStock.as_db())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let defaults = [
            (
                "Notificação de produtos próximos da validade",
                ScheduledTask::ExpiringProducts,
                json!({}),
            ),
            (
                "Notificação de estoque baixo",
                ScheduledTask::LowStock,
                json!({ "min_quantity": settings.min_quantity }),
            ),
        ];

        let mut created = Vec::with_capacity(defaults.len());
        for (name, task, task_args) in defaults {
            let row = sqlx::query(
                "INSERT INTO schedules (name, task, task_args, schedule_type, next_run, repeats) \
                 VALUES ($1, $2, $3, $4, $5, -1) \
                 RETURNING id, name, task, task_args, schedule_type, next_run, repeats, \
                           last_run_at, last_result, created_at",
            )
            .bind(name)
            .bind(task.as_db())
            .bind(task_args)
            .bind(ScheduleType::Daily.as_db())
            .bind(next_run)
            .fetch_one(&mut *tx)
            .await?;
            created.push(schedule_from_row(&row)?);
        }
        tx.commit().await?;

        tracing::info!(
            removed,
            next_run = %next_run,
            min_quantity = settings.min_quantity,
            "default schedules recreated"
        );
        Ok(created)
    }

    pub async fn due(&self, now: OffsetDateTime) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(&format!(
            "{} WHERE next_run <= $1 ORDER BY next_run ASC, id ASC",
            SCHEDULE_COLUMNS
        ))
        .bind(now)
        .fetch_all(self.db.pool())
        .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    /// Takes ownership of the occurrence at `schedule.next_run`. The update is
    /// conditional on `next_run` still matching, so only one worker wins.
    pub async fn claim(&self, schedule: &Schedule, now: OffsetDateTime) -> Result<bool> {
        let result = match schedule.after_run(now) {
            AfterRun::Reschedule { next_run, repeats } => {
                sqlx::query(
                    "UPDATE schedules SET next_run = $3, repeats = $4 \
                     WHERE id = $1 AND next_run = $2",
                )
                .bind(schedule.id)
                .bind(schedule.next_run)
                .bind(next_run)
                .bind(repeats)
                .execute(self.db.pool())
                .await?
            }
            AfterRun::Finish => {
                sqlx::query("DELETE FROM schedules WHERE id = $1 AND next_run = $2")
                    .bind(schedule.id)
                    .bind(schedule.next_run)
                    .execute(self.db.pool())
                    .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }

    pub async fn record_result(
        &self,
        schedule_id: Uuid,
        ran_at: OffsetDateTime,
        result: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE schedules SET last_run_at = $2, last_result = $3 WHERE id = $1")
            .bind(schedule_id)
            .bind(ran_at)
            .bind(result)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScheduleStore for ScheduleService {
    async fn due(&self, now: OffsetDateTime) -> Result<Vec<Schedule>> {
        ScheduleService::due(self, now).await
    }

    async fn claim(&self, schedule: &Schedule, now: OffsetDateTime) -> Result<bool> {
        ScheduleService::claim(self, schedule, now).await
    }

    async fn record_result(
        &self,
        schedule_id: Uuid,
        ran_at: OffsetDateTime,
        result: &str,
    ) -> Result<()> {
        ScheduleService::record_result(self, schedule_id, ran_at, result).await
    }
}

fn schedule_from_row(row: &PgRow) -> Result<Schedule> {
    let task: String = row.get("task");
    let task = ScheduledTask::from_db(&task).ok_or_else(|| anyhow!("unknown task: {}", task))?;
    let schedule_type: String = row.get("schedule_type");
    let schedule_type = ScheduleType::from_db(&schedule_type)
        .ok_or_else(|| anyhow!("unknown schedule type: {}", schedule_type))?;
    let task_args: Value = row.get("task_args");

    Ok(Schedule {
        id: row.get("id"),
        name: row.get("name"),
        task,
        task_args,
        schedule_type,
        next_run: row.get("next_run"),
        repeats: row.get("repeats"),
        last_run_at: row.get("last_run_at"),
        last_result: row.get("last_result"),
        created_at: row.get("created_at"),
    })
}
