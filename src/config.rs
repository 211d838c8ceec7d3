//! Configuration module
//!
//! Loads configuration from environment variables.

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Business limits enforced by the transfer engine
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerLimits {
    /// Smallest amount accepted by any operation
    pub min_transaction_amount: Decimal,

    /// Largest amount accepted by any operation
    pub max_transaction_amount: Decimal,

    /// Cap on cumulative outbound transfer volume per account per day
    pub daily_transfer_limit: Decimal,

    /// How many times a unit of work is re-validated after a version conflict
    pub commit_retries: u32,
}

impl Default for LedgerLimits {
    fn default() -> Self {
        Self {
            min_transaction_amount: Decimal::ONE,
            max_transaction_amount: Decimal::new(10_000, 0),
            daily_transfer_limit: Decimal::new(50_000, 0),
            commit_retries: 5,
        }
    }
}

impl LedgerLimits {
    /// Load limits from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let limits = Self {
            min_transaction_amount: env_or("MIN_TRANSACTION_AMOUNT", defaults.min_transaction_amount)?,
            max_transaction_amount: env_or("MAX_TRANSACTION_AMOUNT", defaults.max_transaction_amount)?,
            daily_transfer_limit: env_or("MAX_DAILY_TRANSFER_LIMIT", defaults.daily_transfer_limit)?,
            commit_retries: env_or("COMMIT_RETRIES", defaults.commit_retries)?,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_transaction_amount <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue("MIN_TRANSACTION_AMOUNT"));
        }
        if self.max_transaction_amount < self.min_transaction_amount {
            return Err(ConfigError::InvalidValue("MAX_TRANSACTION_AMOUNT"));
        }
        if self.daily_transfer_limit <= Decimal::ZERO {
            return Err(ConfigError::InvalidValue("MAX_DAILY_TRANSFER_LIMIT"));
        }
        if self.commit_retries == 0 {
            return Err(ConfigError::InvalidValue("COMMIT_RETRIES"));
        }
        Ok(())
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL; the in-memory store is used when absent
    pub database_url: Option<String>,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    pub host: String,

    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// How often the daily limit reset job checks for a date rollover
    pub reset_check_interval: Duration,

    /// Create two demo accounts at startup when running on the in-memory store
    pub seed_demo_accounts: bool,

    pub limits: LedgerLimits,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let database_max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env_or("PORT", 3000u16)?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let log_json = env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let reset_check_interval =
            Duration::from_secs(env_or("DAILY_RESET_CHECK_INTERVAL_SECS", 60u64)?);

        let seed_demo_accounts = env_or("SEED_DEMO_ACCOUNTS", false)?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            log_json,
            reset_check_interval,
            seed_demo_accounts,
            limits: LedgerLimits::from_env()?,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
