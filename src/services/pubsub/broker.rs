//! Broker abstraction and the fixed channel set

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Logical channels carried by the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    MarketUpdates,
    SentimentUpdates,
    SignalUpdates,
}

impl Channel {
    pub const ALL: [Channel; 3] = [
        Channel::MarketUpdates,
        Channel::SentimentUpdates,
        Channel::SignalUpdates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::MarketUpdates => "market_updates",
            Channel::SentimentUpdates => "sentiment_updates",
            Channel::SignalUpdates => "signal_updates",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| BrokerError::UnknownChannel(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub channel: String,
    pub payload: String,
}

pub type BrokerStream = BoxStream<'static, BrokerMessage>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("broker operation timed out")]
    Timeout,
    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// Cross-process publish/subscribe relay
#[async_trait]
pub trait Broker: Send + Sync {
    /// Cheap reachability check
    async fn ping(&self) -> Result<(), BrokerError>;

    async fn publish(&self, channel: Channel, payload: &str) -> Result<(), BrokerError>;

    /// Subscribe to `channels`. The stream ends when the broker connection drops.
    async fn subscribe(&self, channels: &[Channel]) -> Result<BrokerStream, BrokerError>;
}
