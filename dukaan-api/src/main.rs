use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dukaan_api::{app, auth::bootstrap_admin, AppState};
use dukaan_core::events::EventPublisher;
use dukaan_core::repository::CartRepository;
use dukaan_store::app_config::{Config, StorageBackend};
use dukaan_store::memory::MemoryCartRepository;
use dukaan_store::{DbClient, LogEventPublisher, RedisCartRepository, RedisClient, Repositories};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dukaan_api=debug,dukaan_store=info,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting Dukaan API on port {}", config.server.port);

    // Redis is optional: carts fall back to memory and rate limiting is off
    let redis = match config.redis.url.as_deref() {
        Some(url) => match RedisClient::new(url).await {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("Redis unavailable ({}); continuing without it", e);
                None
            }
        },
        None => None,
    };

    let repos = match config.storage.backend {
        StorageBackend::Memory => {
            let mut repos = Repositories::memory(config.shop.cart_ttl_seconds);
            if let Some(client) = &redis {
                repos.carts = redis_carts(client, config.shop.cart_ttl_seconds);
            }
            repos.seed_demo().await.context("Failed to seed demo catalog")?;
            warn!("Using in-memory storage; data is lost on restart");
            repos
        }
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            let carts: Arc<dyn CartRepository> = match &redis {
                Some(client) => redis_carts(client, config.shop.cart_ttl_seconds),
                None => Arc::new(MemoryCartRepository::new(config.shop.cart_ttl_seconds)),
            };
            Repositories::postgres(db.pool, carts)
        }
    };

    let events = event_publisher(&config)?;

    bootstrap_admin(&repos, &config.auth)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin account: {:?}", e))?;

    let (state, worker) = AppState::new(&config, repos, redis, events)?;
    worker.spawn();

    let app = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

fn redis_carts(client: &RedisClient, ttl_seconds: u64) -> Arc<dyn CartRepository> {
    Arc::new(RedisCartRepository::new(client.clone(), ttl_seconds))
}

#[cfg(feature = "kafka")]
fn event_publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    use dukaan_store::{EventProducer, KafkaEventPublisher};

    match config.kafka.brokers.as_deref() {
        Some(brokers) => {
            let producer = EventProducer::new(brokers).context("Failed to create Kafka producer")?;
            info!("Publishing order events to Kafka at {}", brokers);
            Ok(Arc::new(KafkaEventPublisher::new(producer)))
        }
        None => Ok(Arc::new(LogEventPublisher)),
    }
}

#[cfg(not(feature = "kafka"))]
fn event_publisher(config: &Config) -> anyhow::Result<Arc<dyn EventPublisher>> {
    if config.kafka.brokers.is_some() {
        warn!("Kafka brokers configured but the binary was built without the `kafka` feature");
    }
    Ok(Arc::new(LogEventPublisher))
}
