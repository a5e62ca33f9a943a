use anyhow::Result;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::catalog::{CatalogEntry, CatalogKind};
use crate::infra::db::Db;

/// Category and brand lookups. Both tables share the `(id, name)` shape.
#[derive(Clone)]
pub struct CatalogService {
    db: Db,
    kind: CatalogKind,
}

#[derive(Debug)]
pub enum CreateOutcome {
    Created(CatalogEntry),
    Duplicate,
}

impl CatalogService {
    pub fn new(db: Db, kind: CatalogKind) -> Self {
        Self { db, kind }
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    pub async fn list(&self) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT id, name FROM {} ORDER BY name ASC",
            self.kind.table()
        ))
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CatalogEntry {
                id: row.get("id"),
                name: row.get("name"),
            })
            .collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query(&format!(
            "SELECT id, name FROM {} WHERE id = $1",
            self.kind.table()
        ))
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| CatalogEntry {
            id: row.get("id"),
            name: row.get("name"),
        }))
    }

    pub async fn create(&self, name: &str) -> Result<CreateOutcome> {
        let row = sqlx::query(&format!(
            "INSERT INTO {} (name) VALUES ($1) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING id, name",
            self.kind.table()
        ))
        .bind(name)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(match row {
            Some(row) => CreateOutcome::Created(CatalogEntry {
                id: row.get("id"),
                name: row.get("name"),
            }),
            None => CreateOutcome::Duplicate,
        })
    }

    /// Products referencing the entry keep existing with a NULL reference.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.kind.table()))
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
