//! Email channel over SMTP with STARTTLS.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{error, info, warn};

use super::{EmailChannel, EmailOutcome};
use crate::config::EmailConfig;

pub struct SmtpEmail {
    config: EmailConfig,
    transport: Result<AsyncSmtpTransport<Tokio1Executor>, String>,
}

impl SmtpEmail {
    pub fn new(config: EmailConfig) -> Self {
        let transport = build_transport(&config);
        if let Err(err) = &transport {
            warn!(error = %err, host = %config.host, "invalid SMTP settings, email alerts disabled");
        }
        Self { config, transport }
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, String> {
        let from: Mailbox = self
            .config
            .from_address
            .parse()
            .map_err(|err| format!("remetente inválido '{}': {}", self.config.from_address, err))?;

        let mut builder = Message::builder().from(from).subject(subject);
        for recipient in &self.config.recipients {
            let mailbox: Mailbox = recipient
                .parse()
                .map_err(|err| format!("destinatário inválido '{}': {}", recipient, err))?;
            builder = builder.to(mailbox);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| err.to_string())
    }
}

fn build_transport(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        .map_err(|err| err.to_string())?
        .port(config.port)
        .timeout(Some(Duration::from_secs(config.timeout_seconds)));
    if !config.username.is_empty() {
        builder = builder.credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ));
    }
    Ok(builder.build())
}

#[async_trait]
impl EmailChannel for SmtpEmail {
    async fn send(&self, subject: &str, body: &str) -> EmailOutcome {
        if !self.config.is_configured() {
            warn!("NOTIFICATION_EMAILS not configured, skipping alert email");
            return EmailOutcome::NotConfigured;
        }

        let transport = match &self.transport {
            Ok(transport) => transport,
            Err(err) => return EmailOutcome::Failed(err.clone()),
        };

        let message = match self.build_message(subject, body) {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, "failed to build alert email");
                return EmailOutcome::Failed(err);
            }
        };

        match transport.send(message).await {
            Ok(_) => {
                info!(recipients = ?self.config.recipients, "alert email sent");
                EmailOutcome::Sent {
                    recipients: self.config.recipients.len(),
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(error = %message, host = %self.config.host, "failed to send alert email");
                if message.contains("Network is unreachable") || message.contains("os error 101") {
                    warn!("SMTP host unreachable; the hosting provider may block outbound SMTP");
                }
                EmailOutcome::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(recipients: &[&str], from: &str) -> EmailConfig {
        EmailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "alerts@example.com".to_string(),
            password: "secret".to_string(),
            from_address: from.to_string(),
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            timeout_seconds: 10,
        }
    }

    #[tokio::test]
    async fn no_recipients_is_not_configured() {
        let channel = SmtpEmail::new(config(&[], "alerts@example.com"));
        let outcome = channel.send("assunto", "corpo").await;
        assert_eq!(outcome, EmailOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn bad_sender_address_is_reported_not_raised() {
        let channel = SmtpEmail::new(config(&["ops@example.com"], "not an address"));
        match channel.send("assunto", "corpo").await {
            EmailOutcome::Failed(message) => assert!(message.contains("remetente inválido")),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn builds_plain_text_message_for_every_recipient() {
        let channel = SmtpEmail::new(config(
            &["ops@example.com", "buyer@example.com"],
            "alerts@example.com",
        ));
        let message = channel.build_message("Alerta", "Produtos vencendo").unwrap();
        let envelope = message.envelope();
        assert_eq!(envelope.to().len(), 2);
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Alerta"));
        assert!(raw.contains("Produtos vencendo"));
    }
}
