//! Process configuration from environment variables.

use std::net::SocketAddr;

use thiserror::Error;

use cafeops_observability::LogFormat;
use cafeops_orders::PaymentMethod;

pub const ENV_LISTEN_ADDR: &str = "CAFEOPS_LISTEN_ADDR";
pub const ENV_DATABASE_URL: &str = "CAFEOPS_DATABASE_URL";
pub const ENV_DB_MAX_CONNECTIONS: &str = "CAFEOPS_DB_MAX_CONNECTIONS";
pub const ENV_RUN_MIGRATIONS: &str = "CAFEOPS_RUN_MIGRATIONS";
pub const ENV_PAYMENT_METHOD: &str = "CAFEOPS_PAYMENT_METHOD";
pub const ENV_LOG_FORMAT: &str = "CAFEOPS_LOG_FORMAT";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}' ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Invalid {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub payment_method: PaymentMethod,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            db_max_connections: 10,
            run_migrations: true,
            payment_method: PaymentMethod::Cash,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unset or blank
    /// variables take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(ENV_LISTEN_ADDR) {
            config.listen_addr = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_LISTEN_ADDR, &raw, e))?;
        }

        config.database_url = get(ENV_DATABASE_URL);

        if let Some(raw) = get(ENV_DB_MAX_CONNECTIONS) {
            let n: u32 = raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_DB_MAX_CONNECTIONS, &raw, e))?;
            if n == 0 {
                return Err(ConfigError::invalid(
                    ENV_DB_MAX_CONNECTIONS,
                    &raw,
                    "must be at least 1",
                ));
            }
            config.db_max_connections = n;
        }

        if let Some(raw) = get(ENV_RUN_MIGRATIONS) {
            config.run_migrations = parse_bool(&raw)
                .ok_or_else(|| ConfigError::invalid(ENV_RUN_MIGRATIONS, &raw, "expected true or false"))?;
        }

        if let Some(raw) = get(ENV_PAYMENT_METHOD) {
            config.payment_method = raw
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_PAYMENT_METHOD, &raw, e))?;
        }

        if let Some(raw) = get(ENV_LOG_FORMAT) {
            config.log_format = raw
                .parse()
                .map_err(|e| ConfigError::invalid(ENV_LOG_FORMAT, &raw, e))?;
        }

        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
