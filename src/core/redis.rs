//! Lazily (re)connected Redis handle shared by the cache and broker adapters

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RedisConnectError {
    #[error("invalid redis url: {0}")]
    InvalidUrl(RedisError),
    #[error("redis connection failed: {0}")]
    Connect(RedisError),
    #[error("redis connection timed out after {0:?}")]
    Timeout(Duration),
}

/// Redis client whose connection is established on first use.
///
/// A failed attempt leaves the handle disconnected; the next call tries again.
pub struct LazyRedis {
    client: Client,
    connection: Mutex<Option<ConnectionManager>>,
    timeout: Duration,
}

impl LazyRedis {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RedisConnectError> {
        let client = Client::open(url).map_err(RedisConnectError::InvalidUrl)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
            timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Return the live connection, connecting if needed
    pub async fn connection(&self) -> Result<ConnectionManager, RedisConnectError> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = tokio::time::timeout(self.timeout, ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|_| RedisConnectError::Timeout(self.timeout))?
            .map_err(RedisConnectError::Connect)?;

        debug!("LazyRedis: connection established");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached connection after an I/O failure
    pub async fn reset(&self) {
        let mut guard = self.connection.lock().await;
        if guard.take().is_some() {
            warn!("LazyRedis: dropping failed connection");
        }
    }

    /// PING within the configured timeout
    pub async fn ping(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };

        let result = tokio::time::timeout(
            self.timeout,
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await;

        match result {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!(error = %e, "LazyRedis: ping failed");
                self.reset().await;
                false
            }
            Err(_) => {
                debug!("LazyRedis: ping timed out");
                false
            }
        }
    }
}
