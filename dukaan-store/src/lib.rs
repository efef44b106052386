pub mod app_config;
pub mod database;
pub mod catalog_repo;
pub mod order_repo;
pub mod content_repo;
pub mod user_repo;
pub mod memory;
pub mod redis_repo;
pub mod events;
pub mod seed;

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;
use dukaan_core::repository::{
    BundleRepository, CartRepository, CouponRepository, HomepageRepository, OrderRepository,
    ProductRepository, StoreResult, UserRepository, VisitRepository,
};

pub use database::DbClient;
pub use events::LogEventPublisher;
#[cfg(feature = "kafka")]
pub use events::{EventProducer, KafkaEventPublisher};
pub use redis_repo::{RedisCartRepository, RedisClient};

use catalog_repo::{StoreBundleRepository, StoreProductRepository};
use content_repo::{StoreHomepageRepository, StoreVisitRepository};
use memory::{
    MemoryBundleRepository, MemoryCartRepository, MemoryCouponRepository, MemoryHomepageRepository,
    MemoryOrderRepository, MemoryProductRepository, MemoryState, MemoryUserRepository,
    MemoryVisitRepository,
};
use order_repo::{StoreCouponRepository, StoreOrderRepository};
use user_repo::StoreUserRepository;

/// One handle per repository trait, shared by every request.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub bundles: Arc<dyn BundleRepository>,
    pub coupons: Arc<dyn CouponRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub carts: Arc<dyn CartRepository>,
    pub homepage: Arc<dyn HomepageRepository>,
    pub visits: Arc<dyn VisitRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool, carts: Arc<dyn CartRepository>) -> Self {
        Self {
            products: Arc::new(StoreProductRepository::new(pool.clone())),
            bundles: Arc::new(StoreBundleRepository::new(pool.clone())),
            coupons: Arc::new(StoreCouponRepository::new(pool.clone())),
            orders: Arc::new(StoreOrderRepository::new(pool.clone())),
            carts,
            homepage: Arc::new(StoreHomepageRepository::new(pool.clone())),
            visits: Arc::new(StoreVisitRepository::new(pool.clone())),
            users: Arc::new(StoreUserRepository::new(pool)),
        }
    }

    pub fn memory(cart_ttl_seconds: u64) -> Self {
        let state = Arc::new(RwLock::new(MemoryState::default()));
        Self {
            products: Arc::new(MemoryProductRepository::new(state.clone())),
            bundles: Arc::new(MemoryBundleRepository::new(state.clone())),
            coupons: Arc::new(MemoryCouponRepository::new(state.clone())),
            orders: Arc::new(MemoryOrderRepository::new(state.clone())),
            carts: Arc::new(MemoryCartRepository::new(cart_ttl_seconds)),
            homepage: Arc::new(MemoryHomepageRepository::new(state.clone())),
            visits: Arc::new(MemoryVisitRepository::new(state.clone())),
            users: Arc::new(MemoryUserRepository::new(state)),
        }
    }

    /// Load the demo catalog through the repository traits.
    pub async fn seed_demo(&self) -> StoreResult<()> {
        let demo = seed::demo_catalog();
        for product in &demo.products {
            self.products.create(product).await?;
        }
        for bundle in &demo.bundles {
            self.bundles.create(bundle).await?;
        }
        for coupon in &demo.coupons {
            self.coupons.create(coupon).await?;
        }
        for section in &demo.sections {
            self.homepage.create(section).await?;
        }
        info!(
            "Seeded demo catalog: {} products, {} bundles",
            demo.products.len(),
            demo.bundles.len()
        );
        Ok(())
    }
}
