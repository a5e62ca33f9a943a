//! Operator alert delivery channels.
//!
//! - Email over SMTP
//! - Browser push (VAPID-signed Web Push)
//! - Desktop toast through the platform's notifier
//!
//! Channels never fail the caller: every attempt resolves to an outcome value.

pub mod desktop;
pub mod email;
pub mod web_push;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailOutcome {
    Sent { recipients: usize },
    NotConfigured,
    Failed(String),
}

impl fmt::Display for EmailOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sent { recipients } => write!(f, "Enviado para {} destinatário(s)", recipients),
            Self::NotConfigured => write!(f, "Email não configurado"),
            Self::Failed(error) => write!(f, "Erro ao enviar email: {}", truncate_chars(error, 100)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushOutcome {
    pub sent: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastOutcome {
    pub sent: bool,
    pub error: Option<String>,
}

impl ToastOutcome {
    pub fn shown() -> Self {
        Self {
            sent: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            sent: false,
            error: Some(error.into()),
        }
    }
}

/// Content of a browser push notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Normal,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub message: String,
    pub urgency: Urgency,
    pub duration: Duration,
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> EmailOutcome;
}

#[async_trait]
pub trait PushChannel: Send + Sync {
    async fn broadcast(&self, message: &PushMessage) -> PushOutcome;
}

#[async_trait]
pub trait DesktopChannel: Send + Sync {
    async fn show(&self, toast: &Toast) -> ToastOutcome;
}

/// Truncates to `max_chars` characters, marking the cut with `...`.
pub(crate) fn truncate_chars(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = input.chars().take(keep).collect();
    out.push_str("...");
    out
}
