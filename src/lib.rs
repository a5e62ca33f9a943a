pub mod app;
pub mod channels;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;

use anyhow::Result;
use std::sync::Arc;
use time::UtcOffset;

use crate::app::dispatcher::Dispatcher;
use crate::app::notifications::NotificationService;
use crate::app::products::ProductService;
use crate::app::push_subscriptions::PushSubscriptionService;
use crate::channels::desktop::SystemToast;
use crate::channels::email::SmtpEmail;
use crate::channels::web_push::WebPushSender;
use crate::config::AppConfig;
use crate::infra::db::Db;
use crate::jobs::inventory_alerts::InventoryAlerts;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub admin_token: Option<String>,
    pub business_offset: UtcOffset,
    pub alerts: InventoryAlerts,
    pub push: Arc<WebPushSender>,
    pub email_configured: bool,
}

impl AppState {
    /// Wires the delivery channels and alert jobs on top of `db`.
    pub fn build(db: Db, config: &AppConfig) -> Result<Self> {
        let subscriptions = Arc::new(PushSubscriptionService::new(db.clone()));
        let push = Arc::new(WebPushSender::new(subscriptions, &config.vapid)?);

        let dispatcher = Dispatcher::new(
            Arc::new(NotificationService::new(db.clone())),
            Arc::new(SmtpEmail::new(config.email.clone())),
            push.clone(),
            Arc::new(SystemToast::new(&config.desktop)),
        );
        let alerts = InventoryAlerts::new(
            Arc::new(ProductService::new(db.clone())),
            dispatcher,
            config.business_offset,
            config.low_stock_min_quantity,
        );

        Ok(Self {
            db,
            admin_token: config.admin_token.clone(),
            business_offset: config.business_offset,
            alerts,
            push,
            email_configured: config.email.is_configured(),
        })
    }
}
