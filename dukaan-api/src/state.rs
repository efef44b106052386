use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use dukaan_core::events::EventPublisher;
use dukaan_core::payment::GatewayRegistry;
use dukaan_order::{CartPricer, OrderManager, ShopProfile};
use dukaan_shared::models::events::VisitEvent;
use dukaan_store::app_config::{Config, RateLimitConfig};
use dukaan_store::{RedisClient, Repositories};

use crate::metrics::Metrics;
use crate::worker::TrackingWorker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct ShopSettings {
    pub profile: ShopProfile,
    pub low_stock_threshold: i32,
    pub ip_salt: String,
}

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub manager: Arc<OrderManager>,
    pub gateways: Arc<GatewayRegistry>,
    pub events: Arc<dyn EventPublisher>,
    /// Rate limiting is skipped without Redis.
    pub redis: Option<Arc<RedisClient>>,
    pub tracking: mpsc::Sender<VisitEvent>,
    pub metrics: Arc<Metrics>,
    pub auth: AuthConfig,
    pub shop: ShopSettings,
    pub rate_limit: RateLimitConfig,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
}

impl AppState {
    /// Wire the services described by `config`. The returned worker drains
    /// the tracking queue and must be spawned by the caller.
    pub fn new(
        config: &Config,
        repos: Repositories,
        redis: Option<Arc<RedisClient>>,
        events: Arc<dyn EventPublisher>,
    ) -> anyhow::Result<(Self, TrackingWorker)> {
        let gateways = GatewayRegistry::from_settings(&config.payments.jazzcash, &config.payments.easypaisa)?;
        let pricer = CartPricer::new(config.shop.shipping_policy(), config.shop.currency.clone());
        let manager = OrderManager::new(pricer, gateways.enabled_methods());

        let metrics = Arc::new(Metrics::new()?);
        let (tracking, rx) = mpsc::channel(config.tracking.queue_capacity.max(1));
        let worker = TrackingWorker::new(
            rx,
            repos.visits.clone(),
            metrics.clone(),
            config.tracking.max_attempts.max(1),
            Duration::from_millis(config.tracking.retry_delay_ms),
        );

        let state = Self {
            repos,
            manager: Arc::new(manager),
            gateways: Arc::new(gateways),
            events,
            redis,
            tracking,
            metrics,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
            },
            shop: ShopSettings {
                profile: config.shop.profile(),
                low_stock_threshold: config.shop.low_stock_threshold,
                ip_salt: config.shop.ip_salt.clone(),
            },
            rate_limit: config.rate_limit.clone(),
            cors_origins: config.server.cors_origins.clone(),
        };
        Ok((state, worker))
    }
}
