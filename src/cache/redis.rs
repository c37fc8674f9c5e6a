//! Redis cache.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use super::{Cache, CacheError, CacheKey};

/// Cache stored on Redis, shared by every instance of the service.
///
/// [`ConnectionManager`] multiplexes one connection and reconnects on its own;
/// cloning it is cheap.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis and check the server answers.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut connection = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        tracing::info!("redis connected");

        Ok(Self { connection })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        Ok(conn.get(key.to_string()).await?)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(key.to_string(), value, ttl.as_secs().max(1))
            .await?;
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
