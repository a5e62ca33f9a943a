use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub is_read: bool,
    pub product_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ExpiringSoon,
    LowStock,
}

impl NotificationType {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "expiring_soon" => Some(Self::ExpiringSoon),
            "low_stock" => Some(Self::LowStock),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::ExpiringSoon => "expiring_soon",
            Self::LowStock => "low_stock",
        }
    }
}
