use std::env as std_env;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CHANNEL: &str = "default-channel";
const DEFAULT_LOCALE: &str = "en-US";
const DEFAULT_ORDER_POLL_INTERVAL_MS: u64 = 2000;
const DEFAULT_CHECKOUT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_COOKIE_MAX_AGE_DAYS: i64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Commerce GraphQL endpoint
    #[validate(url)]
    pub commerce_api_url: String,

    /// Public base URL of the storefront; confirmation redirects are built
    /// against it
    #[validate(url)]
    pub storefront_base_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Sales channel used when a request carries no channel of its own
    #[serde(default = "default_channel")]
    pub default_channel: String,

    /// Locale used when a request carries no locale of its own
    #[serde(default = "default_locale")]
    pub default_locale: String,

    /// Delay between order-materialization polls (milliseconds)
    #[serde(default = "default_order_poll_interval_ms")]
    pub order_poll_interval_ms: u64,

    /// TTL for cached checkout reads (seconds); the completion path bypasses
    /// this cache entirely
    #[serde(default = "default_checkout_cache_ttl_secs")]
    pub checkout_cache_ttl_secs: u64,

    /// Lifetime of the checkout-identifier cookie (days)
    #[serde(default = "default_cookie_max_age_days")]
    pub cookie_max_age_days: i64,

    /// Transport timeout for backend calls (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}
fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}
fn default_order_poll_interval_ms() -> u64 {
    DEFAULT_ORDER_POLL_INTERVAL_MS
}
fn default_checkout_cache_ttl_secs() -> u64 {
    DEFAULT_CHECKOUT_CACHE_TTL_SECS
}
fn default_cookie_max_age_days() -> i64 {
    DEFAULT_COOKIE_MAX_AGE_DAYS
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            commerce_api_url: "http://localhost:8000/graphql/".to_string(),
            storefront_base_url: "http://localhost:3000".to_string(),
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            default_channel: default_channel(),
            default_locale: default_locale(),
            order_poll_interval_ms: default_order_poll_interval_ms(),
            checkout_cache_ttl_secs: default_checkout_cache_ttl_secs(),
            cookie_max_age_days: default_cookie_max_age_days(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AppConfig {
    pub fn order_poll_interval(&self) -> Duration {
        Duration::from_millis(self.order_poll_interval_ms)
    }

    pub fn checkout_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.checkout_cache_ttl_secs)
    }

    pub fn cookie_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.cookie_max_age_days)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Loads configuration from layered files plus `APP__`-prefixed environment
/// variables (e.g. `APP__COMMERCE_API_URL`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std_env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("commerce_api_url", "http://localhost:8000/graphql/")?
        .set_default("storefront_base_url", "http://localhost:3000")?;

    let default_path = Path::new(CONFIG_DIR).join("default");
    if default_path.with_extension("toml").exists() {
        builder = builder.add_source(File::from(default_path));
    }
    let env_path = Path::new(CONFIG_DIR).join(&run_env);
    if env_path.with_extension("toml").exists() {
        builder = builder.add_source(File::from(env_path));
    }

    let config: AppConfig = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?
        .try_deserialize()?;

    config
        .validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_checkout={},tower_http=debug", level);
    let filter_directive = std_env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(filter_directive)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.order_poll_interval(), Duration::from_millis(2000));
    }

    #[test]
    fn bad_url_fails_validation() {
        let config = AppConfig {
            commerce_api_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
