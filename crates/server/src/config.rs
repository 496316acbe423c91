//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SYNC_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPIFY_API_SECRET` - Shopify app secret (signs webhooks, HIGH PRIVILEGE)
//!
//! ## Optional
//! - `SYNC_HOST` - Bind address (default: 127.0.0.1)
//! - `SYNC_PORT` - Listen port (default: 3000)
//! - `SHOPIFY_API_VERSION` - API version (default: 2026-01)
//! - `SYNC_PRICE_MULTIPLIER` - Copy price factor in (0, 1] (default: 0.5)
//! - `SYNC_MARKER_TAG` - Tag marking copy products (default: "ProductSync Copy")
//! - `SYNC_DEBOUNCE_SECS` - Webhook debounce window (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::net::{IpAddr, SocketAddr};

use product_sync_core::reconcile::{
    DEFAULT_DEBOUNCE_SECS, DEFAULT_MARKER_TAG, DEFAULT_PRICE_MULTIPLIER,
};
use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Shopify app configuration
    pub shopify: ShopifyAppConfig,
    /// Sync behavior configuration
    pub sync: SyncConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Shopify app credentials and API version.
///
/// Implements `Debug` manually to redact the app secret.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App secret, used for webhook HMAC verification (HIGH PRIVILEGE)
    pub api_secret: SecretString,
    /// Shopify API version (e.g., 2026-01)
    pub api_version: String,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_secret", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Sync behavior knobs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Factor in (0, 1] applied to copy prices relative to the original.
    /// Stamped onto each sync record at duplication time.
    pub price_multiplier: f64,
    /// Marker tag appended to copy products. Stamped onto each sync
    /// record so a later change of this setting does not break existing
    /// pairs.
    pub marker_tag: String,
    /// Webhook debounce window in seconds.
    pub debounce_secs: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("SYNC_DATABASE_URL")?;
        let host = get_env_or_default("SYNC_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("SYNC_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("SYNC_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SYNC_PORT".to_string(), e.to_string()))?;

        let shopify = ShopifyAppConfig::from_env()?;
        let sync = SyncConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            shopify,
            sync,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_secret: SecretString::from(get_required_env("SHOPIFY_API_SECRET")?),
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2026-01"),
        })
    }
}

impl SyncConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let price_multiplier = get_env_or_default(
            "SYNC_PRICE_MULTIPLIER",
            &DEFAULT_PRICE_MULTIPLIER.to_string(),
        )
        .parse::<f64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("SYNC_PRICE_MULTIPLIER".to_string(), e.to_string())
        })?;
        if !(price_multiplier > 0.0 && price_multiplier <= 1.0) {
            return Err(ConfigError::InvalidEnvVar(
                "SYNC_PRICE_MULTIPLIER".to_string(),
                format!("must be in (0, 1], got {price_multiplier}"),
            ));
        }

        let debounce_secs = get_env_or_default("SYNC_DEBOUNCE_SECS", &DEFAULT_DEBOUNCE_SECS.to_string())
            .parse::<i64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SYNC_DEBOUNCE_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            price_multiplier,
            marker_tag: get_env_or_default("SYNC_MARKER_TAG", DEFAULT_MARKER_TAG),
            debounce_secs,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shopify_app_config_debug_redacts_secret() {
        let config = ShopifyAppConfig {
            api_secret: SecretString::from("super_secret_app_secret"),
            api_version: "2026-01".to_string(),
        };

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("2026-01"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_app_secret"));
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().expect("ip"),
            port: 3000,
            shopify: ShopifyAppConfig {
                api_secret: SecretString::from("secret"),
                api_version: "2026-01".to_string(),
            },
            sync: SyncConfig {
                price_multiplier: 0.5,
                marker_tag: "ProductSync Copy".to_string(),
                debounce_secs: 10,
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
