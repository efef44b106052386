use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, warn};
use dukaan_core::repository::{CartRepository, StoreResult};
use dukaan_core::StoreError;
use dukaan_order::Cart;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn get_json(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn set_json(&self, key: &str, payload: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, payload, ttl_seconds).await
    }

    pub async fn del_key(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }

    /// Fixed-window counter. Returns false once `limit` requests have been
    /// seen for `key` within the window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

fn redis_error(err: redis::RedisError) -> StoreError {
    if err.is_io_error() || err.is_timeout() {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Internal(err.to_string())
    }
}

/// Carts as JSON documents under `cart:{key}`, expiring after the shop's cart TTL.
/// Every save pushes the expiry forward.
pub struct RedisCartRepository {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl RedisCartRepository {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(cart_key: &str) -> String {
        format!("cart:{}", cart_key)
    }
}

#[async_trait]
impl CartRepository for RedisCartRepository {
    async fn get(&self, key: &str) -> StoreResult<Option<Cart>> {
        let raw = self.redis.get_json(&Self::key(key)).await.map_err(redis_error)?;
        match raw {
            Some(raw) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => Ok(Some(cart)),
                Err(e) => {
                    // an unreadable cart is treated as gone
                    warn!("Discarding unreadable cart {}: {}", key, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn save(&self, cart: &Cart) -> StoreResult<()> {
        let payload = serde_json::to_string(cart).map_err(|e| StoreError::Internal(e.to_string()))?;
        self.redis
            .set_json(&Self::key(&cart.key), &payload, self.ttl_seconds)
            .await
            .map_err(redis_error)?;
        debug!("Cart saved: {} ({} lines)", cart.key, cart.lines.len());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.redis.del_key(&Self::key(key)).await.map_err(redis_error)
    }
}
