//! Alert wording: per-product notification rows plus the aggregate email,
//! push and desktop messages for one bucket.

use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;
use time::Date;

use crate::app::scan::ExpirySeverity;
use crate::channels::{PushMessage, Toast, Urgency};
use crate::domain::notification::{NewNotification, NotificationType};
use crate::domain::product::Product;

const RULE_WIDTH: usize = 60;
const DESKTOP_LIST_THRESHOLD: usize = 5;
const DESKTOP_LISTED_NAMES: usize = 3;

/// Everything the dispatcher needs for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertBatch {
    /// Prefix of the dispatch summary (`CRÍTICO`, `AVISO`, `Estoque Baixo`).
    pub label: &'static str,
    pub count: usize,
    pub email_subject: String,
    pub email_body: String,
    pub push: PushMessage,
    pub toast: Toast,
    pub notifications: Vec<NewNotification>,
}

/// `dd/mm/yyyy`
pub fn format_date(date: Date) -> String {
    format!(
        "{:02}/{:02}/{:04}",
        date.day(),
        u8::from(date.month()),
        date.year()
    )
}

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn brand_suffix(product: &Product) -> String {
    product
        .brand_name
        .as_deref()
        .map(|brand| format!(" - Marca: {}", brand))
        .unwrap_or_default()
}

/// Desktop text: long lists name a few products before the push body.
fn desktop_summary(products: &[Product], push_body: &str) -> String {
    if products.len() <= DESKTOP_LIST_THRESHOLD {
        return push_body.to_string();
    }
    let names: Vec<&str> = products
        .iter()
        .take(DESKTOP_LISTED_NAMES)
        .map(|product| product.name.as_str())
        .collect();
    format!(
        "{} e mais {} produto(s). {}",
        names.join(", "),
        products.len() - DESKTOP_LISTED_NAMES,
        push_body
    )
}

pub fn expiry_notification(product: &Product, days_left: i64, expiration: Date) -> NewNotification {
    let date = format_date(expiration);
    let (title, message) = if days_left == 0 {
        (
            format!("⚠️ {} - Vence HOJE!", product.name),
            format!(
                "ATENÇÃO! {} vence hoje ({}). Ação imediata necessária!",
                product.name, date
            ),
        )
    } else if days_left <= 3 {
        (
            format!("🚨 {} - Vence em {} dia(s)", product.name, days_left),
            format!(
                "{} vence em {} dia(s) ({}). Quantidade: {}.",
                product.name, days_left, date, product.quantity
            ),
        )
    } else {
        (
            format!("📅 {} - Vence em {} dias", product.name, days_left),
            format!(
                "{} vence em {} dias ({}). Quantidade: {}.",
                product.name, days_left, date, product.quantity
            ),
        )
    };

    NewNotification {
        title,
        message,
        notification_type: NotificationType::ExpiringSoon,
        product_id: Some(product.id),
    }
}

pub fn low_stock_notification(product: &Product) -> NewNotification {
    let (title, message) = match product.quantity {
        0 => (
            format!("🔴 {} - Estoque zerado!", product.name),
            format!(
                "ATENÇÃO! {} está com estoque zerado. É necessário repor urgentemente!",
                product.name
            ),
        ),
        1 => (
            format!("⚠️ {} - Última unidade!", product.name),
            format!(
                "{} está com apenas 1 unidade em estoque. Reposição necessária!",
                product.name
            ),
        ),
        quantity => (
            format!("📦 {} - Estoque baixo ({} unidades)", product.name, quantity),
            format!(
                "{} está com apenas {} unidade(s) em estoque. Considere repor.",
                product.name, quantity
            ),
        ),
    };

    NewNotification {
        title,
        message,
        notification_type: NotificationType::LowStock,
        product_id: Some(product.id),
    }
}

/// Products without an expiration date are skipped.
pub fn expiry_batch(severity: ExpirySeverity, products: &[Product], today: Date) -> AlertBatch {
    let dated: Vec<(&Product, Date)> = products
        .iter()
        .filter_map(|product| product.expiration_date.map(|date| (product, date)))
        .collect();
    let count = dated.len();

    let (title, push_body) = match severity {
        ExpirySeverity::Critical => (
            format!("⚠️ Alerta Crítico: {} produto(s) próximo(s) da validade", count),
            format!(
                "{} produto(s) vence(m) nos próximos {} dias! Ação urgente necessária.",
                count,
                severity.window_days()
            ),
        ),
        ExpirySeverity::Warning => (
            format!("🔔 Aviso: {} produto(s) próximo(s) da validade", count),
            format!(
                "{} produto(s) vence(m) nos próximos {} dias.",
                count,
                severity.window_days()
            ),
        ),
    };

    let mut body = format!(
        "Os seguintes produtos estão próximos da data de validade ({}):\n\n{}\n\n",
        severity.label(),
        rule()
    );
    let mut notifications = Vec::with_capacity(count);
    for (product, expiration) in &dated {
        let days_left = (*expiration - today).whole_days();
        let _ = write!(
            body,
            "• {}{}\n  Vence em: {} dia(s) ({})\n  Quantidade em estoque: {} unidade(s)\n\n",
            product.name,
            brand_suffix(product),
            days_left,
            format_date(*expiration),
            product.quantity
        );
        notifications.push(expiry_notification(product, days_left, *expiration));
    }
    let _ = write!(
        body,
        "\n{}\n\nTotal de produtos: {}\nTipo de alerta: {}\nData da verificação: {}\n",
        rule(),
        count,
        severity.label(),
        format_date(today)
    );

    let (urgency, duration) = match severity {
        ExpirySeverity::Critical => (Urgency::Critical, Duration::from_secs(15)),
        ExpirySeverity::Warning => (Urgency::Normal, Duration::from_secs(10)),
    };
    let listed: Vec<Product> = dated.iter().map(|(product, _)| (*product).clone()).collect();

    AlertBatch {
        label: severity.label(),
        count,
        email_subject: title.clone(),
        email_body: body,
        toast: Toast {
            title: title.clone(),
            message: desktop_summary(&listed, &push_body),
            urgency,
            duration,
        },
        push: PushMessage {
            title,
            body: push_body,
            data: json!({
                "type": "expiring_products",
                "count": count,
                "severity": severity.label().to_lowercase(),
            }),
        },
        notifications,
    }
}

pub fn low_stock_batch(products: &[Product], min_quantity: i32, today: Date) -> AlertBatch {
    let count = products.len();
    let title = format!("📦 Alerta: {} produto(s) com estoque baixo", count);
    let push_body = format!(
        "{} produto(s) com menos de {} unidade(s) em estoque!",
        count, min_quantity
    );

    let mut body = format!(
        "Os seguintes produtos estão com estoque baixo (menos de {} unidades):\n\n{}\n\n",
        min_quantity,
        rule()
    );
    for product in products {
        let _ = write!(
            body,
            "• {}{}\n  Quantidade atual: {} unidade(s)\n  Preço: R$ {:.2}\n\n",
            product.name,
            brand_suffix(product),
            product.quantity,
            product.price
        );
    }
    let _ = write!(
        body,
        "\n{}\n\nTotal de produtos com estoque baixo: {}\nLimite configurado: menos de {} unidades\nData da verificação: {}\n",
        rule(),
        count,
        min_quantity,
        format_date(today)
    );

    let urgency = if products.iter().any(|product| product.quantity == 0) {
        Urgency::Critical
    } else {
        Urgency::Normal
    };
    let duration = if products.iter().any(|product| product.quantity <= 1) {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(10)
    };

    AlertBatch {
        label: "Estoque Baixo",
        count,
        email_subject: title.clone(),
        email_body: body,
        toast: Toast {
            title: title.clone(),
            message: desktop_summary(products, &push_body),
            urgency,
            duration,
        },
        push: PushMessage {
            title,
            body: push_body,
            data: json!({
                "type": "low_stock",
                "count": count,
                "min_quantity": min_quantity,
            }),
        },
        notifications: products.iter().map(low_stock_notification).collect(),
    }
}
