//! Outbound event envelope delivered to endpoints and carried on broker channels
//!
//! Every event serializes to a JSON object with a `type` discriminant
//! (`market`, `sentiment`, `signal`, `subscribed`).

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::market::{AssetClass, PriceTick, SentimentObservation};
use super::signal::{SignalEvent, SignalType};
use crate::services::pubsub::Channel;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Market {
        symbol: String,
        price: f64,
        asset_class: Option<AssetClass>,
        exchange: String,
        currency: String,
        volume: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    Sentiment {
        source: String,
        score: f64,
        text: String,
        symbol: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Signal {
        signal_type: SignalType,
        symbol: String,
        asset_class: Option<AssetClass>,
        price: f64,
        short_sma: f64,
        long_sma: f64,
        details: String,
        timestamp: DateTime<Utc>,
    },
    Subscribed {
        #[serde(skip_serializing_if = "Option::is_none")]
        symbols: Option<SubscribedSymbols>,
        #[serde(skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
    },
}

/// Symbol scope acknowledged by a `subscribed` reply
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubscribedSymbols {
    List(Vec<String>),
    All(AllSymbols),
}

/// Serializes as the literal string `"all"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AllSymbols {
    All,
}

impl ServerEvent {
    pub fn market(tick: &PriceTick) -> Self {
        ServerEvent::Market {
            symbol: tick.symbol.clone(),
            price: tick.price,
            asset_class: tick.asset_class,
            exchange: tick.exchange.clone(),
            currency: tick.currency.clone(),
            volume: tick.volume,
            timestamp: tick.timestamp,
        }
    }

    pub fn sentiment(observation: &SentimentObservation) -> Self {
        ServerEvent::Sentiment {
            source: observation.source.clone(),
            score: observation.score,
            text: observation.text.clone(),
            symbol: observation.symbol.clone(),
            timestamp: observation.timestamp,
        }
    }

    pub fn signal(signal: &SignalEvent, asset_class: Option<AssetClass>) -> Self {
        ServerEvent::Signal {
            signal_type: signal.signal_type,
            symbol: signal.symbol.clone(),
            asset_class,
            price: signal.price,
            short_sma: signal.short_average,
            long_sma: signal.long_average,
            details: signal.details.clone(),
            timestamp: signal.timestamp,
        }
    }

    pub fn subscribed_symbols(symbols: Vec<String>) -> Self {
        ServerEvent::Subscribed {
            symbols: Some(SubscribedSymbols::List(symbols)),
            symbol: None,
        }
    }

    pub fn subscribed_symbol(symbol: impl Into<String>) -> Self {
        ServerEvent::Subscribed {
            symbols: None,
            symbol: Some(symbol.into()),
        }
    }

    pub fn subscribed_all() -> Self {
        ServerEvent::Subscribed {
            symbols: Some(SubscribedSymbols::All(AllSymbols::All)),
            symbol: None,
        }
    }

    /// Symbol used for targeted delivery, if the event carries one
    pub fn symbol(&self) -> Option<&str> {
        match self {
            ServerEvent::Market { symbol, .. } | ServerEvent::Signal { symbol, .. } => {
                Some(symbol.as_str())
            }
            ServerEvent::Sentiment { symbol, .. } => symbol.as_deref(),
            ServerEvent::Subscribed { .. } => None,
        }
    }

    /// Broker channel the event travels on; `subscribed` replies never leave the process
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ServerEvent::Market { .. } => Some(Channel::MarketUpdates),
            ServerEvent::Sentiment { .. } => Some(Channel::SentimentUpdates),
            ServerEvent::Signal { .. } => Some(Channel::SignalUpdates),
            ServerEvent::Subscribed { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
