use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Minimal base configuration shared by every service binary.
///
/// Service-specific settings (database, auth, outbound channels) live in the
/// service's own `Config::from_env`; this loader only covers the pieces that
/// are identical everywhere.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
