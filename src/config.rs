//! Environment-driven service configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
pub const DEFAULT_FOREX_API_URL: &str = "https://open.er-api.com";
pub const DEFAULT_FOREX_BACKUP_API_URL: &str = "https://api.frankfurter.app";
pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_WIKIPEDIA_URL: &str = "https://en.wikipedia.org/wiki";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1_048_576;

/// Browser origins allowed when `ALLOWED_ORIGINS` is unset
pub fn default_allowed_origins(production: bool) -> Vec<String> {
    let origins: &[&str] = if production {
        &["https://tradesentient.netlify.app"]
    } else {
        &[
            "http://localhost:5173",
            "http://localhost:3000",
            "https://tradesentient.netlify.app",
        ]
    };
    origins.iter().map(|o| o.to_string()).collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("signal windows must satisfy 0 < short ({short}) < long ({long})")]
    InvalidWindows { short: usize, long: usize },
}

/// Deployment environment name (`production`, `sandbox`, ...)
pub fn get_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn get_redis_url() -> String {
    env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string())
}

/// Runtime settings shared by the api-server and worker binaries
#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub redis_url: String,
    pub port: u16,
    pub short_window: usize,
    pub long_window: usize,
    pub cache_ttl: Duration,
    pub endpoint_buffer: usize,
    pub broker_timeout: Duration,
    pub refresh_interval_seconds: u64,
    pub forex_api_url: String,
    pub forex_backup_api_url: String,
    pub coingecko_api_url: String,
    pub wikipedia_url: String,
    pub allowed_origins: Vec<String>,
    pub public_rate_limit: u32,
    pub ingest_rate_limit: u32,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: "sandbox".to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            port: 8000,
            short_window: 10,
            long_window: 30,
            cache_ttl: Duration::from_secs(900),
            endpoint_buffer: 256,
            broker_timeout: Duration::from_millis(1000),
            refresh_interval_seconds: 900,
            forex_api_url: DEFAULT_FOREX_API_URL.to_string(),
            forex_backup_api_url: DEFAULT_FOREX_BACKUP_API_URL.to_string(),
            coingecko_api_url: DEFAULT_COINGECKO_API_URL.to_string(),
            wikipedia_url: DEFAULT_WIKIPEDIA_URL.to_string(),
            allowed_origins: default_allowed_origins(false),
            public_rate_limit: 100,
            ingest_rate_limit: 1000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// Load settings from the process environment, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let environment = get_environment();
        let production = matches!(environment.as_str(), "production" | "prod");

        let settings = Self {
            environment,
            redis_url: get_redis_url(),
            port: parse_var("PORT", defaults.port)?,
            short_window: parse_var("SIGNAL_SHORT_WINDOW", defaults.short_window)?,
            long_window: parse_var("SIGNAL_LONG_WINDOW", defaults.long_window)?,
            cache_ttl: Duration::from_secs(parse_var(
                "CACHE_TTL_SECONDS",
                defaults.cache_ttl.as_secs(),
            )?),
            endpoint_buffer: parse_var("ENDPOINT_BUFFER", defaults.endpoint_buffer)?,
            broker_timeout: Duration::from_millis(parse_var(
                "BROKER_TIMEOUT_MS",
                defaults.broker_timeout.as_millis() as u64,
            )?),
            refresh_interval_seconds: parse_var(
                "REFRESH_INTERVAL_SECONDS",
                defaults.refresh_interval_seconds,
            )?,
            forex_api_url: env::var("FOREX_API_URL").unwrap_or(defaults.forex_api_url),
            forex_backup_api_url: env::var("FOREX_BACKUP_API_URL")
                .unwrap_or(defaults.forex_backup_api_url),
            coingecko_api_url: env::var("COINGECKO_API_URL")
                .unwrap_or(defaults.coingecko_api_url),
            wikipedia_url: env::var("WIKIPEDIA_URL").unwrap_or(defaults.wikipedia_url),
            allowed_origins: match env::var("ALLOWED_ORIGINS") {
                Ok(raw) if !raw.trim().is_empty() => parse_origins(&raw),
                _ => default_allowed_origins(production),
            },
            public_rate_limit: parse_var("RATE_LIMIT_PUBLIC_PER_MINUTE", defaults.public_rate_limit)?,
            ingest_rate_limit: parse_var("RATE_LIMIT_INGEST_PER_MINUTE", defaults.ingest_rate_limit)?,
            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes)?,
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_window == 0 || self.short_window >= self.long_window {
            return Err(ConfigError::InvalidWindows {
                short: self.short_window,
                long: self.long_window,
            });
        }
        if self.endpoint_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ENDPOINT_BUFFER",
                value: "0".to_string(),
            });
        }
        for (key, limit) in [
            ("RATE_LIMIT_PUBLIC_PER_MINUTE", self.public_rate_limit),
            ("RATE_LIMIT_INGEST_PER_MINUTE", self.ingest_rate_limit),
        ] {
            if limit == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: "0".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.as_str(), "production" | "prod")
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Comma-separated origin list, blanks dropped
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
