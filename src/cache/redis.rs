//! Redis-backed shared cache tier

use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

use super::ttl::SharedTier;
use super::CacheError;
use crate::core::redis::LazyRedis;

pub struct RedisCache {
    redis: LazyRedis,
}

impl RedisCache {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CacheError> {
        let redis = LazyRedis::new(url, timeout).map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(Self { redis })
    }

    /// Whether Redis currently answers a PING
    pub async fn is_reachable(&self) -> bool {
        self.redis.ping().await
    }

    async fn connection(&self) -> Result<redis::aio::ConnectionManager, CacheError> {
        self.redis
            .connection()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl SharedTier for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection().await?;
        match tokio::time::timeout(self.redis.timeout(), conn.get::<_, Option<String>>(key)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.redis.reset().await;
                Err(CacheError::Unavailable(e.to_string()))
            }
            Err(_) => Err(CacheError::Timeout),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        match tokio::time::timeout(
            self.redis.timeout(),
            conn.set_ex::<_, _, ()>(key, value, seconds),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.redis.reset().await;
                Err(CacheError::Unavailable(e.to_string()))
            }
            Err(_) => Err(CacheError::Timeout),
        }
    }
}
