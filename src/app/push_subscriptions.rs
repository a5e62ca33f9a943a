use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::channels::web_push::SubscriptionStore;
use crate::domain::push_subscription::PushSubscription;
use crate::infra::db::Db;

const SUBSCRIPTION_COLUMNS: &str =
    "SELECT id, endpoint, p256dh, auth, active, created_at, updated_at FROM push_subscriptions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubscriptionCounts {
    pub active: i64,
    pub total: i64,
}

/// Registry of browser push endpoints.
#[derive(Clone)]
pub struct PushSubscriptionService {
    db: Db,
}

impl PushSubscriptionService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent on the `(endpoint, p256dh, auth)` triple. Registering an
    /// existing triple reactivates it. Returns the row and whether it was new.
    pub async fn register(
        &self,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
    ) -> Result<(PushSubscription, bool)> {
        let row = sqlx::query(
            "INSERT INTO push_subscriptions (endpoint, p256dh, auth) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (endpoint, p256dh, auth) \
             DO UPDATE SET active = true, updated_at = now() \
             RETURNING id, endpoint, p256dh, auth, active, created_at, updated_at, \
                       (xmax = 0) AS inserted",
        )
        .bind(endpoint)
        .bind(p256dh)
        .bind(auth)
        .fetch_one(self.db.pool())
        .await?;

        let inserted: bool = row.get("inserted");
        Ok((subscription_from_row(&row), inserted))
    }

    /// Deactivates every row for `endpoint`. Returns the number of rows changed.
    pub async fn deactivate_endpoint(&self, endpoint: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET active = false, updated_at = now() \
             WHERE endpoint = $1 AND active = true",
        )
        .bind(endpoint)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list(&self) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(&format!("{} ORDER BY created_at DESC, id DESC", SUBSCRIPTION_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows.iter().map(subscription_from_row).collect())
    }

    pub async fn list_active(&self) -> Result<Vec<PushSubscription>> {
        let rows = sqlx::query(&format!(
            "{} WHERE active = true ORDER BY created_at ASC, id ASC",
            SUBSCRIPTION_COLUMNS
        ))
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(subscription_from_row).collect())
    }

    pub async fn set_active(&self, subscription_id: Uuid, active: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE push_subscriptions SET active = $2, updated_at = now() WHERE id = $1",
        )
        .bind(subscription_id)
        .bind(active)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, subscription_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(subscription_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes inactive rows, or every row when `all` is set.
    pub async fn cleanup(&self, all: bool) -> Result<u64> {
        let sql = if all {
            "DELETE FROM push_subscriptions"
        } else {
            "DELETE FROM push_subscriptions WHERE active = false"
        };
        let result = sqlx::query(sql).execute(self.db.pool()).await?;
        tracing::info!(removed = result.rows_affected(), all, "push subscriptions cleaned up");
        Ok(result.rows_affected())
    }

    pub async fn counts(&self) -> Result<SubscriptionCounts> {
        let row = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE active) AS active, COUNT(*) AS total \
             FROM push_subscriptions",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(SubscriptionCounts {
            active: row.get("active"),
            total: row.get("total"),
        })
    }
}

#[async_trait]
impl SubscriptionStore for PushSubscriptionService {
    async fn active_subscriptions(&self) -> Result<Vec<PushSubscription>> {
        self.list_active().await
    }

    async fn deactivate(&self, id: Uuid) -> Result<()> {
        self.set_active(id, false).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.remove(id).await?;
        Ok(())
    }
}

fn subscription_from_row(row: &PgRow) -> PushSubscription {
    PushSubscription {
        id: row.get("id"),
        endpoint: row.get("endpoint"),
        p256dh: row.get("p256dh"),
        auth: row.get("auth"),
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
