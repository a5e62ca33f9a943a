use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::UtcOffset;

const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub admin_token: Option<String>,
    pub business_offset: UtcOffset,
    pub low_stock_min_quantity: i32,
    pub scheduler_poll_seconds: u64,
    pub email: EmailConfig,
    pub vapid: VapidConfig,
    pub desktop: DesktopConfig,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub recipients: Vec<String>,
    pub timeout_seconds: u64,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        !self.recipients.is_empty()
    }
}

/// Raw VAPID material as read from the environment. Parsing happens when the
/// push channel is built so a bad key only disables push delivery.
#[derive(Clone, Debug, Default)]
pub struct VapidConfig {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    pub subject: String,
}

#[derive(Clone, Debug)]
pub struct DesktopConfig {
    pub enabled: bool,
    pub app_id: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let business_offset = parse_offset(&env_or("BUSINESS_UTC_OFFSET", "+00:00"))
            .map_err(|err| anyhow!("invalid BUSINESS_UTC_OFFSET: {}", err))?;

        let low_stock_min_quantity: i32 = env_or_parse("LOW_STOCK_MIN_QUANTITY", "2")?;
        if low_stock_min_quantity < 1 {
            return Err(anyhow!("invalid LOW_STOCK_MIN_QUANTITY: must be at least 1"));
        }

        let username = env_or("EMAIL_HOST_USER", "");
        let email = EmailConfig {
            host: env_or("EMAIL_HOST", "smtp.gmail.com"),
            port: env_or_parse("EMAIL_PORT", "587")?,
            from_address: std::env::var("DEFAULT_FROM_EMAIL")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| username.clone()),
            username,
            password: env_or("EMAIL_HOST_PASSWORD", ""),
            recipients: parse_list(&env_or("NOTIFICATION_EMAILS", "")),
            timeout_seconds: env_or_parse("EMAIL_TIMEOUT_SECONDS", "10")?,
        };

        let vapid = VapidConfig {
            public_key: env_non_empty("VAPID_PUBLIC_KEY"),
            private_key: env_non_empty("VAPID_PRIVATE_KEY"),
            subject: env_or("VAPID_SUBJECT", "mailto:admin@localhost"),
        };

        let desktop = DesktopConfig {
            enabled: env_or_parse("DESKTOP_NOTIFICATIONS", "false")?,
            app_id: env_or("DESKTOP_APP_ID", "StockSystem"),
        };

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "10")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            admin_token: env_non_empty("ADMIN_TOKEN"),
            business_offset,
            low_stock_min_quantity,
            scheduler_poll_seconds: env_or_parse("SCHEDULER_POLL_SECONDS", "30")?,
            email,
            vapid,
            desktop,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .trim()
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

pub fn parse_offset(value: &str) -> Result<UtcOffset> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
        return Ok(UtcOffset::UTC);
    }
    UtcOffset::parse(trimmed, OFFSET_FORMAT).map_err(|err| anyhow!("{}", err))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
