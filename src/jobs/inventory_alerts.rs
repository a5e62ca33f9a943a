use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::info;

use crate::app::alerts::{expiry_batch, low_stock_batch};
use crate::app::dispatcher::Dispatcher;
use crate::app::products::ProductService;
use crate::app::scan::{select_low_stock, ExpiryBuckets, WARNING_WINDOW_DAYS};
use crate::domain::product::Product;
use crate::domain::schedule::ScheduledTask;
use crate::jobs::scheduler::TaskExecutor;

pub const NOTHING_EXPIRING: &str = "✅ Nenhum produto próximo da validade encontrado. Tudo em ordem!";
pub const NOTHING_LOW_STOCK: &str = "✅ Nenhum produto com estoque baixo encontrado. Tudo em ordem!";

/// Inventory queries the scans depend on.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn expiring_within(&self, today: Date, days: i64) -> Result<Vec<Product>>;
    async fn low_stock(&self, min_quantity: i32) -> Result<Vec<Product>>;
}

#[async_trait]
impl InventorySource for ProductService {
    async fn expiring_within(&self, today: Date, days: i64) -> Result<Vec<Product>> {
        ProductService::expiring_within(self, today, days).await
    }

    async fn low_stock(&self, min_quantity: i32) -> Result<Vec<Product>> {
        ProductService::low_stock(self, min_quantity).await
    }
}

/// The two inventory scans. Each returns the human-readable run summary.
#[derive(Clone)]
pub struct InventoryAlerts {
    inventory: Arc<dyn InventorySource>,
    dispatcher: Dispatcher,
    business_offset: UtcOffset,
    default_min_quantity: i32,
}

impl InventoryAlerts {
    pub fn new(
        inventory: Arc<dyn InventorySource>,
        dispatcher: Dispatcher,
        business_offset: UtcOffset,
        default_min_quantity: i32,
    ) -> Self {
        Self {
            inventory,
            dispatcher,
            business_offset,
            default_min_quantity,
        }
    }

    pub fn default_min_quantity(&self) -> i32 {
        self.default_min_quantity
    }

    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.business_offset).date()
    }

    pub async fn check_expiring_products(&self) -> Result<String> {
        self.check_expiring_products_on(self.today()).await
    }

    pub async fn check_expiring_products_on(&self, today: Date) -> Result<String> {
        info!(%today, "checking expiring products");
        let products = self
            .inventory
            .expiring_within(today, WARNING_WINDOW_DAYS)
            .await?;
        let buckets = ExpiryBuckets::partition(products, today);
        info!(
            critical = buckets.critical.len(),
            warning = buckets.warning.len(),
            "expiry scan classified products"
        );

        let mut results = Vec::new();
        for (severity, products) in buckets.into_dispatch() {
            let batch = expiry_batch(severity, &products, today);
            results.push(self.dispatcher.dispatch(&batch).await);
        }

        if results.is_empty() {
            info!("no products close to expiry");
            return Ok(NOTHING_EXPIRING.to_string());
        }
        Ok(results.join(" | "))
    }

    pub async fn check_low_stock(&self, min_quantity: i32) -> Result<String> {
        self.check_low_stock_on(min_quantity, self.today()).await
    }

    pub async fn check_low_stock_on(&self, min_quantity: i32, today: Date) -> Result<String> {
        if min_quantity < 1 {
            return Err(anyhow!("min_quantity must be at least 1"));
        }
        info!(min_quantity, "checking low stock");
        let products = select_low_stock(self.inventory.low_stock(min_quantity).await?, min_quantity);
        if products.is_empty() {
            info!(min_quantity, "no low stock products");
            return Ok(NOTHING_LOW_STOCK.to_string());
        }

        let batch = low_stock_batch(&products, min_quantity, today);
        Ok(self.dispatcher.dispatch(&batch).await)
    }

    /// `min_quantity` from schedule arguments, falling back to the configured default.
    pub fn min_quantity_from(&self, args: &Value) -> Result<i32> {
        match args.get("min_quantity") {
            None | Some(Value::Null) => Ok(self.default_min_quantity),
            Some(value) => value
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
                .filter(|value| *value >= 1)
                .ok_or_else(|| anyhow!("invalid min_quantity: {}", value)),
        }
    }
}

#[async_trait]
impl TaskExecutor for InventoryAlerts {
    async fn execute(&self, task: ScheduledTask, args: &Value) -> Result<String> {
        match task {
            ScheduledTask::ExpiringProducts => self.check_expiring_products().await,
            ScheduledTask::LowStock => {
                let min_quantity = self.min_quantity_from(args)?;
                self.check_low_stock(min_quantity).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatcher::NotificationStore;
    use crate::channels::{
        DesktopChannel, EmailChannel, EmailOutcome, PushChannel, PushMessage, PushOutcome, Toast,
        ToastOutcome,
    };
    use crate::domain::notification::NewNotification;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Mutex;
    use time::macros::{date, datetime};
    use time::Duration;
    use uuid::Uuid;

    const TODAY: Date = date!(2024 - 05 - 10);

    struct MemoryInventory(Vec<Product>);

    #[async_trait]
    impl InventorySource for MemoryInventory {
        async fn expiring_within(&self, today: Date, days: i64) -> Result<Vec<Product>> {
            Ok(self
                .0
                .iter()
                .filter(|p| {
                    p.quantity > 0
                        && p.expiration_date
                            .map_or(false, |d| d >= today && d <= today + Duration::days(days))
                })
                .cloned()
                .collect())
        }

        async fn low_stock(&self, min_quantity: i32) -> Result<Vec<Product>> {
            Ok(self
                .0
                .iter()
                .filter(|p| p.quantity > 0 && p.quantity < min_quantity)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct Recorder {
        notifications: Mutex<Vec<NewNotification>>,
        pushes: Mutex<Vec<PushMessage>>,
    }

    #[async_trait]
    impl NotificationStore for Recorder {
        async fn record(&self, notifications: &[NewNotification]) -> Result<usize> {
            self.notifications.lock().unwrap().extend_from_slice(notifications);
            Ok(notifications.len())
        }
    }

    #[async_trait]
    impl EmailChannel for Recorder {
        async fn send(&self, _subject: &str, _body: &str) -> EmailOutcome {
            EmailOutcome::NotConfigured
        }
    }

    #[async_trait]
    impl PushChannel for Recorder {
        async fn broadcast(&self, message: &PushMessage) -> PushOutcome {
            self.pushes.lock().unwrap().push(message.clone());
            PushOutcome::default()
        }
    }

    #[async_trait]
    impl DesktopChannel for Recorder {
        async fn show(&self, _toast: &Toast) -> ToastOutcome {
            ToastOutcome::failed("Não disponível")
        }
    }

    fn product(name: &str, quantity: i32, days: Option<i64>) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            price: Decimal::new(300, 2),
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

    fn alerts(products: Vec<Product>) -> (InventoryAlerts, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = Dispatcher::new(
            recorder.clone(),
            recorder.clone(),
            recorder.clone(),
            recorder.clone(),
        );
        let alerts = InventoryAlerts::new(
            Arc::new(MemoryInventory(products)),
            dispatcher,
            UtcOffset::UTC,
            2,
        );
        (alerts, recorder)
    }

    #[tokio::test]
    async fn nothing_expiring_reports_all_clear() {
        let (alerts, recorder) = alerts(vec![product("far", 3, Some(45)), product("empty", 0, Some(1))]);
        let result = alerts.check_expiring_products_on(TODAY).await.unwrap();
        assert_eq!(result, NOTHING_EXPIRING);
        assert!(recorder.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn expiring_today_dispatches_only_the_critical_bucket() {
        let (alerts, recorder) = alerts(vec![
            product("Leite", 5, Some(0)),
            product("Arroz", 5, Some(20)),
        ]);
        let result = alerts.check_expiring_products_on(TODAY).await.unwrap();

        assert_eq!(
            result,
            "CRÍTICO: 1 produto(s) - Email: Email não configurado, Push: 0 enviados, Desktop: ❌"
        );
        let notifications = recorder.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "⚠️ Leite - Vence HOJE!");
        assert_eq!(recorder.pushes.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn low_stock_respects_threshold() {
        let (alerts, recorder) = alerts(vec![
            product("one", 1, None),
            product("zero", 0, None),
            product("two", 2, None),
        ]);

        let result = alerts.check_low_stock_on(2, TODAY).await.unwrap();
        assert!(result.starts_with("Estoque Baixo: 1 produto(s)"));
        let notifications = recorder.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "⚠️ one - Última unidade!");
    }

    #[tokio::test]
    async fn low_stock_with_nothing_found() {
        let (alerts, _) = alerts(vec![product("plenty", 50, None)]);
        assert_eq!(alerts.check_low_stock_on(2, TODAY).await.unwrap(), NOTHING_LOW_STOCK);
        assert!(alerts.check_low_stock_on(0, TODAY).await.is_err());
    }

    #[test]
    fn reads_min_quantity_from_task_args() {
        let (alerts, _) = alerts(Vec::new());
        assert_eq!(alerts.min_quantity_from(&json!({})).unwrap(), 2);
        assert_eq!(alerts.min_quantity_from(&json!({ "min_quantity": 5 })).unwrap(), 5);
        assert!(alerts.min_quantity_from(&json!({ "min_quantity": 0 })).is_err());
        assert!(alerts.min_quantity_from(&json!({ "min_quantity": "x" })).is_err());
    }
}
