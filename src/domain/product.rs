use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::domain::iso_date;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    #[serde(default, with = "iso_date::option")]
    pub expiration_date: Option<Date>,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub brand_id: Option<Uuid>,
    pub brand_name: Option<String>,
    pub batch: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Product {
    /// Whole days from `today` until expiration; negative once expired.
    pub fn days_until_expiry(&self, today: Date) -> Option<i64> {
        self.expiration_date
            .map(|expiration| (expiration - today).whole_days())
    }
}

/// Writable product fields, used for creation and as the merged result of a patch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default, with = "iso_date::option")]
    pub expiration_date: Option<Date>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub brand_id: Option<Uuid>,
    #[serde(default)]
    pub batch: Option<String>,
}

/// Partial update. Nullable fields accept `null` to clear the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::domain::nullable")]
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    #[serde(default, deserialize_with = "crate::domain::nullable_iso_date")]
    pub expiration_date: Option<Option<Date>>,
    #[serde(default, deserialize_with = "crate::domain::nullable")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::domain::nullable")]
    pub brand_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::domain::nullable")]
    pub batch: Option<Option<String>>,
}

impl ProductPatch {
    pub fn apply(self, current: &Product) -> NewProduct {
        NewProduct {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            description: self.description.unwrap_or_else(|| current.description.clone()),
            price: self.price.unwrap_or(current.price),
            quantity: self.quantity.unwrap_or(current.quantity),
            expiration_date: self.expiration_date.unwrap_or(current.expiration_date),
            category_id: self.category_id.unwrap_or(current.category_id),
            brand_id: self.brand_id.unwrap_or(current.brand_id),
            batch: self.batch.unwrap_or_else(|| current.batch.clone()),
        }
    }
}

impl NewProduct {
    /// Trims text fields and checks column constraints. Price is rounded to cents.
    pub fn normalize(mut self) -> Result<Self, String> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.name.chars().count() > 200 {
            return Err("name must be at most 200 characters".to_string());
        }
        self.price = self.price.round_dp(2);
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_string());
        }
        if self.price >= Decimal::new(100_000_000, 0) {
            return Err("price must be below 100000000".to_string());
        }
        if self.quantity < 0 {
            return Err("quantity must not be negative".to_string());
        }
        self.description = self
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        self.batch = self
            .batch
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if self.batch.as_ref().map_or(false, |batch| batch.chars().count() > 100) {
            return Err("batch must be at most 100 characters".to_string());
        }
        Ok(self)
    }
}

/// Sort keys accepted by the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductOrdering {
    Name,
    Price,
    ExpirationDate,
}

impl ProductOrdering {
    /// Parses `name`, `-price`, etc. Returns the key and whether it is descending.
    pub fn parse(value: &str) -> Option<(Self, bool)> {
        let (descending, key) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let ordering = match key {
            "name" => Self::Name,
            "price" => Self::Price,
            "expiration_date" => Self::ExpirationDate,
            _ => return None,
        };
        Some((ordering, descending))
    }

    pub fn as_column(&self) -> &'static str {
        match self {
            Self::Name => "p.name",
            Self::Price => "p.price",
            Self::ExpirationDate => "p.expiration_date",
        }
    }
}
