use serde::Deserialize;
use std::env;
use dukaan_core::payment::{EasyPaisaSettings, JazzCashSettings};
use dukaan_order::{ShippingPolicy, ShopProfile};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    pub auth: AuthConfig,
    pub shop: ShopConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Carts fall back to process memory and rate limiting is off when unset.
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ShopConfig {
    #[serde(default = "default_shop_name")]
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Minor units.
    pub shipping_fee: i64,
    pub free_shipping_threshold: Option<i64>,
    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: i32,
    #[serde(default = "default_cart_ttl")]
    pub cart_ttl_seconds: u64,
    /// Salt for visitor IP fingerprints.
    #[serde(default)]
    pub ip_salt: String,
}

fn default_shop_name() -> String { "Dukaan".to_string() }
fn default_currency() -> String { "PKR".to_string() }
fn default_low_stock() -> i32 { 5 }
fn default_cart_ttl() -> u64 { 60 * 60 * 24 * 7 }

impl ShopConfig {
    pub fn shipping_policy(&self) -> ShippingPolicy {
        ShippingPolicy {
            flat_fee: self.shipping_fee,
            free_threshold: self.free_shipping_threshold,
        }
    }

    pub fn profile(&self) -> ShopProfile {
        ShopProfile {
            name: self.name.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentsConfig {
    #[serde(default)]
    pub jazzcash: JazzCashSettings,
    #[serde(default)]
    pub easypaisa: EasyPaisaSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackingConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_queue_capacity() -> usize { 1024 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 500 }

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_requests")]
    pub requests: i64,
    #[serde(default = "default_rate_window")]
    pub window_seconds: i64,
}

fn default_rate_requests() -> i64 { 120 }
fn default_rate_window() -> i64 { 60 }

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: default_rate_requests(),
            window_seconds: default_rate_window(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `DUKAAN__SERVER__PORT=8080`
            .add_source(
                config::Environment::with_prefix("DUKAAN")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }
}
