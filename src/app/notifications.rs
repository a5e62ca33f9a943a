use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::dispatcher::NotificationStore;
use crate::domain::notification::{NewNotification, Notification, NotificationType};
use crate::infra::db::Db;

const NOTIFICATION_COLUMNS: &str = "SELECT id, title, message, notification_type::text AS notification_type, \
            is_read, product_id, created_at \
     FROM notifications";

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        unread_only: bool,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        let rows = match cursor {
            Some((created_at, notification_id)) => {
                sqlx::query(&format!(
                    "{} WHERE ($1 = false OR is_read = false) \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                    NOTIFICATION_COLUMNS
                ))
                .bind(unread_only)
                .bind(created_at)
                .bind(notification_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "{} WHERE ($1 = false OR is_read = false) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                    NOTIFICATION_COLUMNS
                ))
                .bind(unread_only)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        rows.iter().map(notification_from_row).collect()
    }

    pub async fn get(&self, notification_id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", NOTIFICATION_COLUMNS))
            .bind(notification_id)
            .fetch_optional(self.db.pool())
            .await?;
        row.as_ref().map(notification_from_row).transpose()
    }

    pub async fn unread_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE is_read = false")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Returns false when the notification does not exist.
    pub async fn mark_read(&self, notification_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1")
            .bind(notification_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = true WHERE is_read = false")
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, notification_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(notification_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_many(&self, notifications: &[NewNotification]) -> Result<usize> {
        let mut tx = self.db.pool().begin().await?;
        for notification in notifications {
            sqlx::query(
                "INSERT INTO notifications (title, message, notification_type, product_id) \
                 VALUES ($1, $2, $3::notification_type, $4)",
            )
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(notification.notification_type.as_db())
            .bind(notification.product_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(notifications.len())
    }
}

#[async_trait]
impl NotificationStore for NotificationService {
    async fn record(&self, notifications: &[NewNotification]) -> Result<usize> {
        self.insert_many(notifications).await
    }
}

fn notification_from_row(row: &PgRow) -> Result<Notification> {
    let notification_type: String = row.get("notification_type");
    let notification_type = NotificationType::from_db(&notification_type)
        .ok_or_else(|| anyhow!("unknown notification type: {}", notification_type))?;

    Ok(Notification {
        id: row.get("id"),
        title: row.get("title"),
        message: row.get("message"),
        notification_type,
        is_read: row.get("is_read"),
        product_id: row.get("product_id"),
        created_at: row.get("created_at"),
    })
}
