use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

use crate::app::alerts::AlertBatch;
use crate::channels::{DesktopChannel, EmailChannel, PushChannel, PushOutcome, ToastOutcome};
use crate::domain::notification::NewNotification;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn record(&self, notifications: &[NewNotification]) -> Result<usize>;
}

/// Fans one alert batch out to every channel. A failing channel never stops
/// the others, and nothing is returned as an error: the outcome of each step
/// ends up in the summary line.
#[derive(Clone)]
pub struct Dispatcher {
    notifications: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailChannel>,
    push: Arc<dyn PushChannel>,
    desktop: Arc<dyn DesktopChannel>,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailChannel>,
        push: Arc<dyn PushChannel>,
        desktop: Arc<dyn DesktopChannel>,
    ) -> Self {
        Self {
            notifications,
            email,
            push,
            desktop,
        }
    }

    pub async fn dispatch(&self, batch: &AlertBatch) -> String {
        let recorded = match self.notifications.record(&batch.notifications).await {
            Ok(count) => Ok(count),
            Err(err) => {
                error!(error = ?err, label = batch.label, "failed to record notifications");
                Err(err.to_string())
            }
        };

        let email = self.email.send(&batch.email_subject, &batch.email_body).await;
        let push = self.push.broadcast(&batch.push).await;
        let desktop = self.desktop.show(&batch.toast).await;

        info!(
            label = batch.label,
            count = batch.count,
            recorded = recorded.as_ref().ok(),
            email = %email,
            push_sent = push.sent,
            push_failed = push.failed,
            desktop = desktop.sent,
            "alert dispatched"
        );

        summary_line(batch, &email.to_string(), &push, &desktop, recorded.err())
    }
}

fn summary_line(
    batch: &AlertBatch,
    email: &str,
    push: &PushOutcome,
    desktop: &ToastOutcome,
    record_error: Option<String>,
) -> String {
    let mut line = format!(
        "{}: {} produto(s) - Email: {}, Push: {} enviados",
        batch.label, batch.count, email, push.sent
    );
    if let Some(error) = &push.error {
        line.push_str(&format!(" ({})", error));
    }
    line.push_str(&format!(
        ", Desktop: {}",
        if desktop.sent { "✅" } else { "❌" }
    ));
    if let Some(error) = record_error {
        line.push_str(&format!(", Registro: {}", error));
    }
    line
}
