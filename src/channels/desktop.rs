//! Best-effort desktop toast through the host's notifier command.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{truncate_chars, DesktopChannel, Toast, ToastOutcome, Urgency};
use crate::config::DesktopConfig;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_MESSAGE_CHARS: usize = 200;

/// A resolved notifier invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastCommand {
    pub program: &'static str,
    pub args: Vec<String>,
}

pub struct SystemToast {
    enabled: bool,
    app_id: String,
}

impl SystemToast {
    pub fn new(config: &DesktopConfig) -> Self {
        Self {
            enabled: config.enabled,
            app_id: config.app_id.clone(),
        }
    }
}

#[async_trait]
impl DesktopChannel for SystemToast {
    async fn show(&self, toast: &Toast) -> ToastOutcome {
        if !self.enabled {
            debug!("desktop notifications disabled");
            return ToastOutcome::failed("Não disponível");
        }

        let Some(command) = toast_command(std::env::consts::OS, &self.app_id, toast) else {
            debug!(os = std::env::consts::OS, "no desktop notifier for this platform");
            return ToastOutcome::failed("Sistema não suportado");
        };

        let run = Command::new(command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(COMMAND_TIMEOUT, run).await {
            Ok(Ok(output)) if output.status.success() => {
                info!(title = %toast.title, "desktop notification shown");
                ToastOutcome::shown()
            }
            Ok(Ok(output)) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let error = format!("{} saiu com {}: {}", command.program, output.status, stderr.trim());
                warn!(error = %error, "desktop notification failed");
                ToastOutcome::failed(error)
            }
            Ok(Err(err)) => {
                warn!(error = %err, program = command.program, "desktop notifier unavailable");
                ToastOutcome::failed(err.to_string())
            }
            Err(_) => {
                warn!(program = command.program, "desktop notifier timed out");
                ToastOutcome::failed("Tempo esgotado")
            }
        }
    }
}

/// Builds the notifier command for `os` (as in `std::env::consts::OS`).
pub fn toast_command(os: &str, app_id: &str, toast: &Toast) -> Option<ToastCommand> {
    let message = truncate_chars(&toast.message, MAX_MESSAGE_CHARS);
    match os {
        "linux" | "freebsd" | "openbsd" | "netbsd" => {
            let urgency = match toast.urgency {
                Urgency::Critical => "critical",
                Urgency::Normal => "normal",
            };
            Some(ToastCommand {
                program: "notify-send",
                args: vec![
                    format!("--app-name={}", app_id),
                    format!("--urgency={}", urgency),
                    format!("--expire-time={}", toast.duration.as_millis()),
                    toast.title.clone(),
                    message,
                ],
            })
        }
        "macos" => {
            let sound = match toast.urgency {
                Urgency::Critical => " sound name \"Sosumi\"",
                Urgency::Normal => "",
            };
            Some(ToastCommand {
                program: "osascript",
                args: vec![
                    "-e".to_string(),
                    format!(
                        "display notification \"{}\" with title \"{}\"{}",
                        applescript_escape(&message),
                        applescript_escape(&toast.title),
                        sound
                    ),
                ],
            })
        }
        "windows" => Some(ToastCommand {
            program: "powershell",
            args: vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                windows_toast_script(app_id, &toast.title, &message, toast.urgency),
            ],
        }),
        _ => None,
    }
}

fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn windows_toast_script(app_id: &str, title: &str, message: &str, urgency: Urgency) -> String {
    let (duration, audio) = match urgency {
        Urgency::Critical => ("long", "ms-winsoundevent:Notification.Reminder"),
        Urgency::Normal => ("short", "ms-winsoundevent:Notification.Default"),
    };
    let xml = format!(
        "<toast duration=\"{}\"><visual><binding template=\"ToastGeneric\"><text>{}</text><text>{}</text></binding></visual><audio src=\"{}\" loop=\"false\"/></toast>",
        duration,
        xml_escape(title),
        xml_escape(message),
        audio
    );
    format!(
        "[Windows.UI.Notifications.ToastNotificationManager, Windows.UI.Notifications, ContentType = WindowsRuntime] | Out-Null; \
         [Windows.Data.Xml.Dom.XmlDocument, Windows.Data.Xml.Dom.XmlDocument, ContentType = WindowsRuntime] | Out-Null; \
         $xml = New-Object Windows.Data.Xml.Dom.XmlDocument; \
         $xml.LoadXml({}); \
         [Windows.UI.Notifications.ToastNotificationManager]::CreateToastNotifier({}).Show([Windows.UI.Notifications.ToastNotification]::new($xml))",
        powershell_quote(&xml),
        powershell_quote(app_id)
    )
}
