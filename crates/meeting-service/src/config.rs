//! Meeting service configuration.
//!
//! Configuration is loaded from environment variables. The database URL is
//! redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default maximum number of pooled database connections.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;

/// Default timeout for token service calls in seconds.
pub const DEFAULT_TOKEN_SERVICE_TIMEOUT_SECONDS: u64 = 10;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Which meeting store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Durable Postgres store (requires `DATABASE_URL`).
    Postgres,
    /// Process-local store, lost on restart.
    Memory,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Meeting service configuration.
#[derive(Clone)]
pub struct Config {
    /// Store backend selection.
    pub store_backend: StoreBackend,

    /// PostgreSQL connection URL. Required for the Postgres backend.
    pub database_url: Option<String>,

    /// Maximum pooled database connections.
    pub db_max_connections: u32,

    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Room token service endpoint. Token issuance is unavailable when unset.
    pub token_service_url: Option<String>,

    /// Timeout for token service calls in seconds.
    pub token_service_timeout_seconds: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Graceful shutdown drain period in seconds.
    pub drain_seconds: u64,

    /// Log output format.
    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("store_backend", &self.store_backend)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("bind_address", &self.bind_address)
            .field("token_service_url", &self.token_service_url)
            .field(
                "token_service_timeout_seconds",
                &self.token_service_timeout_seconds,
            )
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("drain_seconds", &self.drain_seconds)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid store backend: {0}")]
    InvalidStoreBackend(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),

    #[error("Invalid numeric configuration: {0}")]
    InvalidNumber(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let store_backend = match vars.get("STORE_BACKEND").map(String::as_str) {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidStoreBackend(format!(
                    "STORE_BACKEND must be 'postgres' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = vars.get("DATABASE_URL").cloned();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let db_max_connections =
            parse_positive(vars, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let token_service_url = vars
            .get("TOKEN_SERVICE_URL")
            .filter(|url| !url.trim().is_empty())
            .cloned();

        let token_service_timeout_seconds = parse_positive(
            vars,
            "TOKEN_SERVICE_TIMEOUT_SECONDS",
            DEFAULT_TOKEN_SERVICE_TIMEOUT_SECONDS,
        )?;

        let request_timeout_seconds = parse_positive(
            vars,
            "REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        )?;

        // Zero is valid here: skip the drain period entirely.
        let drain_seconds = match vars.get("DRAIN_SECONDS") {
            Some(value_str) => value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidNumber(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?,
            None => 0,
        };

        let log_format = match vars.get("LOG_FORMAT").map(String::as_str) {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'text' or 'json', got '{}'",
                    other
                )))
            }
        };

        Ok(Config {
            store_backend,
            database_url,
            db_max_connections,
            bind_address,
            token_service_url,
            token_service_timeout_seconds,
            request_timeout_seconds,
            drain_seconds,
            log_format,
        })
    }
}

/// Parse a strictly positive integer variable, falling back to `default` when unset.
fn parse_positive<T>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: fmt::Display,
{
    let Some(value_str) = vars.get(key) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e: T::Err| {
        ConfigError::InvalidNumber(format!(
            "{} must be a valid positive integer, got '{}': {}",
            key, value_str, e
        ))
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidNumber(format!(
            "{} must be greater than 0",
            key
        )));
    }

    Ok(value)
}
