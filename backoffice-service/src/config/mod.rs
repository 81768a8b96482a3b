use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use serde::Deserialize;
use std::env;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub reminder: ReminderConfig,
    pub smtp: SmtpConfig,
    pub gateway: GatewayConfig,
    pub storage: StorageConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Deserialize, Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

/// Invoice reminder delivery. The webhook is tried first when a URL is
/// configured; SMTP is the fallback channel.
#[derive(Deserialize, Clone, Debug)]
pub struct ReminderConfig {
    pub webhook_url: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Simulated payment gateway behavior.
#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub latency_ms: u64,
    /// Probability of a successful charge, 0.0 to 1.0.
    pub success_rate: f64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct StorageConfig {
    pub receipt_dir: String,
    pub max_receipt_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("BACKOFFICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("BACKOFFICE_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()?;

        let db_url = env::var("BACKOFFICE_DATABASE_URL").expect("BACKOFFICE_DATABASE_URL must be set");
        let max_connections = env::var("BACKOFFICE_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("BACKOFFICE_DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let jwt_secret = env::var("BACKOFFICE_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());

        let webhook_url = env::var("BACKOFFICE_REMINDER_WEBHOOK_URL").ok();
        let reminder_timeout = env::var("BACKOFFICE_REMINDER_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;

        let smtp_enabled = env::var("BACKOFFICE_SMTP_ENABLED")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        let smtp_host = env::var("BACKOFFICE_SMTP_HOST").unwrap_or_else(|_| "localhost".to_string());
        let smtp_port = env::var("BACKOFFICE_SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()?;
        let smtp_user = env::var("BACKOFFICE_SMTP_USER").unwrap_or_default();
        let smtp_password = env::var("BACKOFFICE_SMTP_PASSWORD").unwrap_or_default();
        let from_email = env::var("BACKOFFICE_SMTP_FROM_EMAIL")
            .unwrap_or_else(|_| "billing@example.com".to_string());
        let from_name = env::var("BACKOFFICE_SMTP_FROM_NAME")
            .unwrap_or_else(|_| "Back Office".to_string());

        let latency_ms = env::var("BACKOFFICE_GATEWAY_LATENCY_MS")
            .unwrap_or_else(|_| "200".to_string())
            .parse()?;
        let success_rate = env::var("BACKOFFICE_GATEWAY_SUCCESS_RATE")
            .unwrap_or_else(|_| "0.95".to_string())
            .parse()?;

        let receipt_dir = env::var("BACKOFFICE_RECEIPT_DIR")
            .unwrap_or_else(|_| "./data/receipts".to_string());
        let max_receipt_bytes = env::var("BACKOFFICE_MAX_RECEIPT_BYTES")
            .unwrap_or_else(|_| (5 * 1024 * 1024).to_string())
            .parse()?;

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            reminder: ReminderConfig {
                webhook_url,
                timeout_seconds: reminder_timeout,
            },
            smtp: SmtpConfig {
                enabled: smtp_enabled,
                host: smtp_host,
                port: smtp_port,
                user: smtp_user,
                password: smtp_password,
                from_email,
                from_name,
            },
            gateway: GatewayConfig {
                latency_ms,
                success_rate,
            },
            storage: StorageConfig {
                receipt_dir,
                max_receipt_bytes,
            },
            service_name: "backoffice-service".to_string(),
        })
    }
}
