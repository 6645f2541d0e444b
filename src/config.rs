//! Application configuration management.
//!
//! Configuration is read once at startup from environment variables (and an
//! optional `.env` file) with `envy`, into one flat [`Config`]. Field names map
//! to upper-case keys: `jwt_secret_key` reads `JWT_SECRET_KEY`.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::jobs::{Queue, QueueConfig};
use crate::money::{DEFAULT_CONVERSION_FEE_PERCENT, round_currency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Where queued jobs live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// `job_tasks` table in the primary store; survives restarts.
    Postgres,
    /// Process memory; for tests and local runs.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    Console,
    Http,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` or `DB_HOST/DB_USER/DB_PASSWORD/DB_NAME/DB_PORT`
/// - `JWT_SECRET_KEY` (required)
/// - `PORT` (optional): HTTP server port, defaults to 8080
///
/// Every other key has a default suitable for local development.
#[derive(Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default, alias = "go_env")]
    pub app_env: Option<AppEnv>,
    #[serde(default)]
    pub log_format: Option<LogFormat>,

    // Store
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_db_host")]
    pub db_host: String,
    #[serde(default = "default_db_user")]
    pub db_user: String,
    #[serde(default)]
    pub db_password: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    #[serde(default = "default_db_port")]
    pub db_port: u16,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    // Tokens
    pub jwt_secret_key: String,
    #[serde(default)]
    pub jwt_refresh_secret_key: Option<String>,
    /// Minutes.
    #[serde(default = "default_access_minutes")]
    pub jwt_access_token_duration: i64,
    /// Minutes.
    #[serde(default = "default_refresh_minutes")]
    pub jwt_refresh_token_duration: i64,
    #[serde(default = "default_issuer")]
    pub jwt_issuer: String,

    // Job queue
    #[serde(default)]
    pub queue_backend: Option<QueueBackend>,
    #[serde(default = "default_queue_concurrency")]
    pub queue_concurrency: usize,
    #[serde(default)]
    pub queue_strict_priority: bool,
    /// Seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub queue_shutdown_timeout: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub queue_poll_interval_ms: u64,
    /// Hours a settled task is kept before the janitor purges it.
    #[serde(default = "default_retention_hours")]
    pub queue_retention_hours: u64,
    #[serde(default = "default_critical_weight")]
    pub queue_critical_priority: u32,
    #[serde(default = "default_high_weight")]
    pub queue_high_priority: u32,
    #[serde(default = "default_default_weight")]
    pub queue_default_priority: u32,
    #[serde(default = "default_low_weight")]
    pub queue_low_priority: u32,

    // Payment processors
    #[serde(default)]
    pub paystack_secret_key: String,
    #[serde(default)]
    pub paystack_public_key: String,
    #[serde(default = "default_paystack_base_url")]
    pub paystack_base_url: String,
    #[serde(default)]
    pub momo_secret_key: String,

    // Email
    #[serde(default)]
    pub email_provider: Option<EmailProvider>,
    #[serde(default)]
    pub email_api_url: String,
    #[serde(default)]
    pub email_api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,

    // Links and CORS
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_fee_percent")]
    pub conversion_fee_percent: f64,

    /// Local directory for uploaded profile pictures, served under `/uploads`.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

fn default_port() -> u16 {
    8080
}
fn default_db_host() -> String {
    "localhost".to_string()
}
fn default_db_user() -> String {
    "postgres".to_string()
}
fn default_db_name() -> String {
    "jeanpay".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_access_minutes() -> i64 {
    60
}
fn default_refresh_minutes() -> i64 {
    7 * 24 * 60
}
fn default_issuer() -> String {
    "jeanpay".to_string()
}
fn default_queue_concurrency() -> usize {
    10
}
fn default_shutdown_timeout() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_retention_hours() -> u64 {
    24
}
fn default_critical_weight() -> u32 {
    6
}
fn default_high_weight() -> u32 {
    4
}
fn default_default_weight() -> u32 {
    3
}
fn default_low_weight() -> u32 {
    1
}
fn default_paystack_base_url() -> String {
    "https://api.paystack.co".to_string()
}
fn default_from_email() -> String {
    "no-reply@jeanpay.africa".to_string()
}
fn default_from_name() -> String {
    "JeanPay".to_string()
}
fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_admin_url() -> String {
    "http://localhost:3001".to_string()
}
fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_fee_percent() -> f64 {
    2.0
}
fn default_upload_dir() -> String {
    "uploads".to_string()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("app_env", &self.env())
            .field("db_host", &self.db_host)
            .field("db_name", &self.db_name)
            .field("queue_backend", &self.queue_backend())
            .field("queue_concurrency", &self.queue_concurrency)
            .field("email_provider", &self.email_provider())
            .field("secrets", &"[REDACTED]")
            .finish()
    }
}

impl Config {
    /// Load configuration from `.env` (if present) and the environment.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    /// Load from explicit pairs; used by tests.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        envy::from_iter(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
    }

    pub fn env(&self) -> AppEnv {
        self.app_env.unwrap_or(AppEnv::Development)
    }

    /// Test endpoints (`/api/test/*`) are mounted outside production.
    pub fn test_endpoints_enabled(&self) -> bool {
        self.env() != AppEnv::Production
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.unwrap_or(LogFormat::Pretty)
    }

    pub fn queue_backend(&self) -> QueueBackend {
        self.queue_backend.unwrap_or(QueueBackend::Postgres)
    }

    pub fn email_provider(&self) -> EmailProvider {
        self.email_provider.unwrap_or(EmailProvider::Console)
    }

    /// `DATABASE_URL` when set, otherwise built from the `DB_*` keys.
    pub fn database_url(&self) -> String {
        match &self.database_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            ),
        }
    }

    /// Refresh secret; falls back to the access secret plus a suffix.
    pub fn refresh_secret(&self) -> String {
        match &self.jwt_refresh_secret_key {
            Some(secret) if !secret.is_empty() => secret.clone(),
            _ => format!("{}_refresh", self.jwt_secret_key),
        }
    }

    /// Conversion fee in percent, rounded to two places.
    pub fn fee_percent(&self) -> Decimal {
        Decimal::try_from(self.conversion_fee_percent)
            .map(round_currency)
            .unwrap_or(DEFAULT_CONVERSION_FEE_PERCENT)
    }

    pub fn queue(&self) -> QueueConfig {
        QueueConfig {
            concurrency: self.queue_concurrency.max(1),
            strict_priority: self.queue_strict_priority,
            weights: vec![
                (Queue::Critical, self.queue_critical_priority),
                (Queue::High, self.queue_high_priority),
                (Queue::Default, self.queue_default_priority),
                (Queue::Low, self.queue_low_priority),
            ],
            shutdown_timeout: Duration::from_secs(self.queue_shutdown_timeout),
            poll_interval: Duration::from_millis(self.queue_poll_interval_ms.max(10)),
            retention: Duration::from_secs(self.queue_retention_hours.saturating_mul(3600)),
        }
    }

    /// Reject link and processor URLs that would only fail later, at the
    /// first email or checkout.
    pub fn validate(&self) -> Result<(), String> {
        let urls = [
            ("FRONTEND_URL", &self.frontend_url),
            ("ADMIN_URL", &self.admin_url),
            ("SERVER_URL", &self.server_url),
            ("PAYSTACK_BASE_URL", &self.paystack_base_url),
        ];
        for (key, value) in urls {
            let parsed = url::Url::parse(value).map_err(|e| format!("{key} is invalid: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("{key} must be an http(s) URL"));
            }
        }
        if self.jwt_secret_key.len() < 16 && self.env() == AppEnv::Production {
            return Err("JWT_SECRET_KEY must be at least 16 characters in production".to_string());
        }
        Ok(())
    }

    /// Origins allowed by CORS.
    pub fn allowed_origins(&self) -> Vec<String> {
        [&self.frontend_url, &self.admin_url]
            .into_iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minimal() -> Config {
        Config::from_pairs([("JWT_SECRET_KEY", "secret")]).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let config = minimal();
        assert_eq!(config.port, 8080);
        assert_eq!(config.env(), AppEnv::Development);
        assert_eq!(config.queue_backend(), QueueBackend::Postgres);
        assert_eq!(config.email_provider(), EmailProvider::Console);
        assert_eq!(config.jwt_access_token_duration, 60);
        assert_eq!(config.fee_percent(), dec!(2.0));
        assert_eq!(config.database_url(), "postgres://postgres:@localhost:5432/jeanpay");
        assert!(config.test_endpoints_enabled());
    }

    #[test]
    fn jwt_secret_is_required() {
        assert!(Config::from_pairs(Vec::<(String, String)>::new()).is_err());
    }

    #[test]
    fn refresh_secret_falls_back_to_access_secret() {
        assert_eq!(minimal().refresh_secret(), "secret_refresh");
        let config = Config::from_pairs([
            ("JWT_SECRET_KEY", "secret"),
            ("JWT_REFRESH_SECRET_KEY", "other"),
        ])
        .unwrap();
        assert_eq!(config.refresh_secret(), "other");
    }

    #[test]
    fn enums_and_overrides_parse() {
        let config = Config::from_pairs([
            ("JWT_SECRET_KEY", "secret"),
            ("APP_ENV", "production"),
            ("QUEUE_BACKEND", "memory"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://u:p@db/x"),
            ("CONVERSION_FEE_PERCENT", "1.5"),
            ("QUEUE_CONCURRENCY", "4"),
            ("QUEUE_STRICT_PRIORITY", "true"),
        ])
        .unwrap();
        assert_eq!(config.env(), AppEnv::Production);
        assert!(!config.test_endpoints_enabled());
        assert_eq!(config.queue_backend(), QueueBackend::Memory);
        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.database_url(), "postgres://u:p@db/x");
        assert_eq!(config.fee_percent(), dec!(1.5));

        let queue = config.queue();
        assert_eq!(queue.concurrency, 4);
        assert!(queue.strict_priority);
        assert_eq!(queue.weights[0], (Queue::Critical, 6));
    }

    #[test]
    fn validate_rejects_bad_urls() {
        assert!(minimal().validate().is_ok());

        let config = Config::from_pairs([
            ("JWT_SECRET_KEY", "secret"),
            ("FRONTEND_URL", "not a url"),
        ])
        .unwrap();
        assert!(config.validate().unwrap_err().contains("FRONTEND_URL"));

        let config = Config::from_pairs([
            ("JWT_SECRET_KEY", "secret"),
            ("SERVER_URL", "ftp://files.example.com"),
        ])
        .unwrap();
        assert!(config.validate().is_err());

        let config =
            Config::from_pairs([("JWT_SECRET_KEY", "short"), ("APP_ENV", "production")]).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn legacy_environment_key_is_accepted() {
        let config =
            Config::from_pairs([("JWT_SECRET_KEY", "secret"), ("GO_ENV", "test")]).unwrap();
        assert_eq!(config.env(), AppEnv::Test);
    }
}
