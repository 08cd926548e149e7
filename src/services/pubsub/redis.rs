//! Redis pub/sub broker

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

use super::broker::{Broker, BrokerError, BrokerMessage, BrokerStream, Channel};
use crate::core::redis::LazyRedis;

pub struct RedisBroker {
    redis: LazyRedis,
}

impl RedisBroker {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, BrokerError> {
        let redis = LazyRedis::new(url, timeout).map_err(|e| BrokerError::Unavailable(e.to_string()))?;
        Ok(Self { redis })
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn ping(&self) -> Result<(), BrokerError> {
        if self.redis.ping().await {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("redis did not answer PING".to_string()))
        }
    }

    async fn publish(&self, channel: Channel, payload: &str) -> Result<(), BrokerError> {
        let mut conn = self
            .redis
            .connection()
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        match tokio::time::timeout(
            self.redis.timeout(),
            conn.publish::<_, _, i64>(channel.as_str(), payload),
        )
        .await
        {
            Ok(Ok(_receivers)) => Ok(()),
            Ok(Err(e)) => {
                self.redis.reset().await;
                Err(BrokerError::Unavailable(e.to_string()))
            }
            Err(_) => Err(BrokerError::Timeout),
        }
    }

    async fn subscribe(&self, channels: &[Channel]) -> Result<BrokerStream, BrokerError> {
        let names: Vec<&'static str> = channels.iter().map(Channel::as_str).collect();

        let mut pubsub = tokio::time::timeout(self.redis.timeout(), self.redis.client().get_async_pubsub())
            .await
            .map_err(|_| BrokerError::Timeout)?
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        pubsub
            .subscribe(names)
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        let stream = pubsub.into_on_message().filter_map(|msg| async move {
            let channel = msg.get_channel_name().to_string();
            match msg.get_payload::<String>() {
                Ok(payload) => Some(BrokerMessage { channel, payload }),
                Err(e) => {
                    warn!(channel = %channel, error = %e, "RedisBroker: dropping non-text payload");
                    None
                }
            }
        });
        Ok(Box::pin(stream))
    }
}
