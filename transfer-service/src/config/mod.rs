//! Configuration module for transfer-service.

use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub transfer_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl TransferConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let store = match lookup("STORE_BACKEND").as_deref().map(str::trim) {
            Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                    other
                )));
            }
            None if database_url.is_some() => StoreBackend::Postgres,
            None => StoreBackend::Memory,
        };

        let database = match (store, database_url) {
            (StoreBackend::Postgres, None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_URL is required for the postgres store"
                )));
            }
            (StoreBackend::Postgres, Some(url)) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parse_or(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
            }),
            (StoreBackend::Memory, _) => None,
        };

        let timeout_ms: u64 = parse_or(&lookup, "TRANSFER_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "TRANSFER_TIMEOUT_MS must be greater than zero"
            )));
        }

        Ok(Self {
            common,
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "transfer-service".to_string()),
            service_version: lookup("SERVICE_VERSION")
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            store,
            database,
            transfer_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
        }),
        None => Ok(default),
    }
}
