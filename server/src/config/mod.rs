use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173";
const DEFAULT_PAYMENT_BASE_URL: &str = "https://api.xendit.co";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub production: bool,
    pub allowed_origins: Vec<String>,
    pub database: DatabaseConfig,
    pub payment: PaymentConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Applied to every statement, so no transaction waits on a lock forever.
    pub statement_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// `None` leaves the provider unconfigured; bookings still succeed without a pay link.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    /// Shared secret the provider presents on callbacks. `None` rejects every callback.
    pub webhook_token: Option<String>,
    pub currency: String,
    pub invoice_ttl: Duration,
    pub frontend_url: String,
}

impl PaymentConfig {
    pub fn success_redirect_url(&self) -> String {
        format!("{}/booking/success", self.frontend_url.trim_end_matches('/'))
    }

    pub fn failure_redirect_url(&self) -> String {
        format!("{}/booking/failed", self.frontend_url.trim_end_matches('/'))
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = DatabaseConfig {
            url: get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            acquire_timeout: Duration::from_secs(parse_or(
                &get,
                "DATABASE_ACQUIRE_TIMEOUT_SECS",
                5,
            )?),
            statement_timeout: Duration::from_millis(parse_or(
                &get,
                "DATABASE_STATEMENT_TIMEOUT_MS",
                5000,
            )?),
        };

        let payment = PaymentConfig {
            api_key: get("PAYMENT_API_KEY"),
            base_url: get("PAYMENT_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PAYMENT_BASE_URL.to_string()),
            timeout: Duration::from_secs(parse_or(&get, "PAYMENT_TIMEOUT_SECS", 10)?),
            webhook_token: get("PAYMENT_WEBHOOK_TOKEN"),
            currency: get("PAYMENT_CURRENCY").unwrap_or_else(|| "IDR".to_string()),
            invoice_ttl: Duration::from_secs(parse_or(&get, "PAYMENT_INVOICE_TTL_SECS", 86_400)?),
            frontend_url: get("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
        };

        let allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            production: get("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            allowed_origins,
            database,
            payment,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_defaults_leave_payment_unconfigured() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/cinema")]))
                .unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.database.statement_timeout, Duration::from_millis(5000));
        assert!(config.payment.api_key.is_none());
        assert!(config.payment.webhook_token.is_none());
        assert_eq!(config.payment.currency, "IDR");
        assert_eq!(config.allowed_origins, vec!["http://localhost:5173"]);
        assert!(!config.production);
    }

    #[test]
    fn test_blank_secret_counts_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/cinema"),
            ("PAYMENT_WEBHOOK_TOKEN", "   "),
        ]))
        .unwrap();
        assert!(config.payment.webhook_token.is_none());
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/cinema"),
            ("PAYMENT_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                var: "PAYMENT_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_redirect_urls_follow_frontend() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/cinema"),
            ("FRONTEND_URL", "https://cinema.example/"),
            ("CORS_ALLOWED_ORIGINS", "https://cinema.example, ,http://localhost:5173"),
        ]))
        .unwrap();
        assert_eq!(
            config.payment.success_redirect_url(),
            "https://cinema.example/booking/success"
        );
        assert_eq!(
            config.payment.failure_redirect_url(),
            "https://cinema.example/booking/failed"
        );
        assert_eq!(config.allowed_origins.len(), 2);
    }
}
