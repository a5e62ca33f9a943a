use anyhow::Result;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::{Date, Duration};
use uuid::Uuid;

use crate::domain::product::{NewProduct, Product, ProductOrdering};
use crate::infra::db::Db;

const PRODUCT_COLUMNS: &str = "SELECT p.id, p.name, p.description, p.price, p.quantity, \
            p.expiration_date, p.category_id, c.name AS category_name, \
            p.brand_id, b.name AS brand_name, p.batch, p.created_at, p.updated_at \
     FROM products p \
     LEFT JOIN categories c ON c.id = p.category_id \
     LEFT JOIN brands b ON b.id = p.brand_id";

#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub batch: Option<String>,
    pub ordering: Option<(ProductOrdering, bool)>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_products: i64,
    pub expired_products: i64,
    pub critical_products: i64,
    pub expiring_soon: i64,
    pub low_stock: i64,
    pub good_products: i64,
}

/// Products below this quantity count as low stock on the dashboard.
const DASHBOARD_LOW_STOCK_BELOW: i32 = 10;

#[derive(Clone)]
pub struct ProductService {
    db: Db,
}

impl ProductService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn list(&self, filter: &ProductFilter) -> Result<Vec<Product>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(|search| format!("%{}%", escape_like(search)));
        let order_by = match filter.ordering {
            Some((ordering, descending)) => format!(
                "{} {} NULLS LAST, p.id",
                ordering.as_column(),
                if descending { "DESC" } else { "ASC" }
            ),
            None => "p.created_at DESC, p.id".to_string(),
        };

        let rows = sqlx::query(&format!(
            "{} WHERE ($1::text IS NULL \
                    OR p.name ILIKE $1 ESCAPE '\\' \
                    OR p.description ILIKE $1 ESCAPE '\\' \
                    OR p.batch ILIKE $1 ESCAPE '\\') \
               AND ($2::uuid IS NULL OR p.category_id = $2) \
               AND ($3::uuid IS NULL OR p.brand_id = $3) \
               AND ($4::text IS NULL OR p.batch = $4) \
             ORDER BY {} \
             LIMIT $5 OFFSET $6",
            PRODUCT_COLUMNS, order_by
        ))
        .bind(search)
        .bind(filter.category_id)
        .bind(filter.brand_id)
        .bind(filter.batch.as_deref())
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    pub async fn get(&self, product_id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query(&format!("{} WHERE p.id = $1", PRODUCT_COLUMNS))
            .bind(product_id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(row.as_ref().map(product_from_row))
    }

    pub async fn create(&self, product: &NewProduct) -> Result<Product> {
        let product_id: Uuid = sqlx::query_scalar(
            "INSERT INTO products \
                (name, description, price, quantity, expiration_date, category_id, brand_id, batch) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id",
        )
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.expiration_date)
        .bind(product.category_id)
        .bind(product.brand_id)
        .bind(&product.batch)
        .fetch_one(self.db.pool())
        .await?;

        self.get(product_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("product {} vanished after insert", product_id))
    }

    pub async fn update(&self, product_id: Uuid, product: &NewProduct) -> Result<Option<Product>> {
        let result = sqlx::query(
            "UPDATE products \
             SET name = $2, description = $3, price = $4, quantity = $5, expiration_date = $6, \
                 category_id = $7, brand_id = $8, batch = $9, updated_at = now() \
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.quantity)
        .bind(product.expiration_date)
        .bind(product.category_id)
        .bind(product.brand_id)
        .bind(&product.batch)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(product_id).await
    }

    pub async fn delete(&self, product_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// In-stock products expiring between `today` and `today + days`, inclusive,
    /// soonest first.
    pub async fn expiring_within(&self, today: Date, days: i64) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{} WHERE p.quantity > 0 AND p.expiration_date >= $1 AND p.expiration_date <= $2 \
             ORDER BY p.expiration_date ASC, p.name ASC",
            PRODUCT_COLUMNS
        ))
        .bind(today)
        .bind(today + Duration::days(days))
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    pub async fn expired(&self, today: Date) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{} WHERE p.expiration_date < $1 ORDER BY p.expiration_date ASC, p.name ASC",
            PRODUCT_COLUMNS
        ))
        .bind(today)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    /// Products with `0 < quantity < min_quantity`, lowest quantity first.
    pub async fn low_stock(&self, min_quantity: i32) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "{} WHERE p.quantity > 0 AND p.quantity < $1 ORDER BY p.quantity ASC, p.name ASC",
            PRODUCT_COLUMNS
        ))
        .bind(min_quantity)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.iter().map(product_from_row).collect())
    }

    pub async fn dashboard_stats(&self, today: Date) -> Result<DashboardStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE expiration_date < $1) AS expired, \
                    COUNT(*) FILTER (WHERE expiration_date >= $1 AND expiration_date <= $2) AS critical, \
                    COUNT(*) FILTER (WHERE expiration_date >= $3 AND expiration_date <= $4) AS expiring_soon, \
                    COUNT(*) FILTER (WHERE quantity < $5) AS low_stock \
             FROM products",
        )
        .bind(today)
        .bind(today + Duration::days(3))
        .bind(today + Duration::days(4))
        .bind(today + Duration::days(7))
        .bind(DASHBOARD_LOW_STOCK_BELOW)
        .fetch_one(self.db.pool())
        .await?;

        let total: i64 = row.get("total");
        let expired: i64 = row.get("expired");
        let critical: i64 = row.get("critical");
        let expiring_soon: i64 = row.get("expiring_soon");
        Ok(DashboardStats {
            total_products: total,
            expired_products: expired,
            critical_products: critical,
            expiring_soon,
            low_stock: row.get("low_stock"),
            good_products: total - expired - critical - expiring_soon,
        })
    }
}

fn product_from_row(row: &PgRow) -> Product {
    Product {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        price: row.get("price"),
        quantity: row.get("quantity"),
        expiration_date: row.get("expiration_date"),
        category_id: row.get("category_id"),
        category_name: row.get("category_name"),
        brand_id: row.get("brand_id"),
        brand_name: row.get("brand_name"),
        batch: row.get("batch"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("leite"), "leite");
    }
}
