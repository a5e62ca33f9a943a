use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named catalog entry: a product category or a brand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Category,
    Brand,
}

impl CatalogKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Category => "categories",
            Self::Brand => "brands",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Brand => "brand",
        }
    }
}
