//! Severity classification of inventory rows.

use time::Date;

use crate::domain::product::Product;

/// Last day (inclusive) of the critical window, counted from today.
pub const CRITICAL_WINDOW_DAYS: i64 = 7;
/// Last day (inclusive) of the warning window.
pub const WARNING_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirySeverity {
    Critical,
    Warning,
}

impl ExpirySeverity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "CRÍTICO",
            Self::Warning => "AVISO",
        }
    }

    pub fn window_days(&self) -> i64 {
        match self {
            Self::Critical => CRITICAL_WINDOW_DAYS,
            Self::Warning => WARNING_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExpiryBuckets {
    pub critical: Vec<Product>,
    pub warning: Vec<Product>,
}

impl ExpiryBuckets {
    /// Splits in-stock products into the 0..=7 and 8..=30 day windows, each
    /// sorted by soonest expiration. Everything else is dropped.
    pub fn partition(products: Vec<Product>, today: Date) -> Self {
        let mut buckets = Self::default();
        for product in products {
            if product.quantity <= 0 {
                continue;
            }
            match product.days_until_expiry(today) {
                Some(days) if (0..=CRITICAL_WINDOW_DAYS).contains(&days) => {
                    buckets.critical.push(product)
                }
                Some(days) if days > CRITICAL_WINDOW_DAYS && days <= WARNING_WINDOW_DAYS => {
                    buckets.warning.push(product)
                }
                _ => {}
            }
        }
        buckets.critical.sort_by_key(|product| product.expiration_date);
        buckets.warning.sort_by_key(|product| product.expiration_date);
        buckets
    }

    /// Buckets that should be dispatched. Warnings are held back whenever a
    /// critical alert goes out.
    pub fn into_dispatch(self) -> Vec<(ExpirySeverity, Vec<Product>)> {
        if !self.critical.is_empty() {
            return vec![(ExpirySeverity::Critical, self.critical)];
        }
        if !self.warning.is_empty() {
            return vec![(ExpirySeverity::Warning, self.warning)];
        }
        Vec::new()
    }
}

/// Products with `0 < quantity < min_quantity`, lowest quantity first, then by name.
pub fn select_low_stock(products: Vec<Product>, min_quantity: i32) -> Vec<Product> {
    let mut selected: Vec<Product> = products
        .into_iter()
        .filter(|product| product.quantity > 0 && product.quantity < min_quantity)
        .collect();
    selected.sort_by(|a, b| a.quantity.cmp(&b.quantity).then_with(|| a.name.cmp(&b.name)));
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::macros::{date, datetime};
    use time::Duration;
    use uuid::Uuid;

    const TODAY: Date = date!(2024 - 05 - 10);

    fn product(name: &str, quantity: i32, days: Option<i64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            price: Decimal::new(1000, 2),
            quantity,
            expiration_date: days.map(|days| TODAY + Duration::days(days)),
            category_id: None,
            category_name: None,
            brand_id: None,
            brand_name: None,
            batch: None,
            created_at: datetime!(2024-05-01 12:00 UTC),
            updated_at: datetime!(2024-05-01 12:00 UTC),
        }
    }

    fn names(products: &[Product]) -> Vec<&str> {
        products.iter().map(|product| product.name.as_str()).collect()
    }

    #[test]
    fn partitions_by_window_and_sorts_by_expiry() {
        let buckets = ExpiryBuckets::partition(
            vec![
                product("seven", 1, Some(7)),
                product("today", 5, Some(0)),
                product("eight", 2, Some(8)),
                product("thirty", 2, Some(30)),
                product("thirty-one", 2, Some(31)),
                product("expired", 2, Some(-1)),
                product("no-date", 2, None),
                product("three", 4, Some(3)),
            ],
            TODAY,
        );

        assert_eq!(names(&buckets.critical), vec!["today", "three", "seven"]);
        assert_eq!(names(&buckets.warning), vec!["eight", "thirty"]);
    }

    #[test]
    fn out_of_stock_products_are_never_bucketed() {
        let buckets =
            ExpiryBuckets::partition(vec![product("empty", 0, Some(1)), product("empty-later", 0, Some(20))], TODAY);
        assert!(buckets.critical.is_empty());
        assert!(buckets.warning.is_empty());
        assert!(buckets.into_dispatch().is_empty());
    }

    #[test]
    fn critical_alert_suppresses_warning_bucket() {
        let dispatch = ExpiryBuckets::partition(
            vec![product("soon", 1, Some(2)), product("later", 1, Some(20))],
            TODAY,
        )
        .into_dispatch();

        assert_eq!(dispatch.len(), 1);
        assert_eq!(dispatch[0].0, ExpirySeverity::Critical);
        assert_eq!(names(&dispatch[0].1), vec!["soon"]);
    }

    #[test]
    fn warning_bucket_dispatches_alone() {
        let dispatch =
            ExpiryBuckets::partition(vec![product("later", 1, Some(20))], TODAY).into_dispatch();
        assert_eq!(dispatch.len(), 1);
        assert_eq!(dispatch[0].0, ExpirySeverity::Warning);
    }

    #[test]
    fn low_stock_excludes_empty_and_at_threshold() {
        let selected = select_low_stock(
            vec![
                product("two", 2, None),
                product("zero", 0, None),
                product("b-one", 1, None),
                product("a-one", 1, None),
            ],
            2,
        );
        assert_eq!(names(&selected), vec!["a-one", "b-one"]);

        let selected = select_low_stock(
            vec![product("four", 4, None), product("two", 2, None), product("five", 5, None)],
            5,
        );
        assert_eq!(names(&selected), vec!["two", "four"]);
    }
}
