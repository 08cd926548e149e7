//! Inbound market observations (price ticks and sentiment)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset class a symbol is traded under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Crypto,
    UsStock,
    InStock,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Crypto, AssetClass::UsStock, AssetClass::InStock];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "crypto",
            AssetClass::UsStock => "us_stock",
            AssetClass::InStock => "in_stock",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "Crypto",
            AssetClass::UsStock => "US Stocks",
            AssetClass::InStock => "Indian Stocks",
        }
    }

    pub fn exchange(&self) -> &'static str {
        match self {
            AssetClass::Crypto => "global",
            AssetClass::UsStock => "NASDAQ/NYSE",
            AssetClass::InStock => "NSE",
        }
    }

    /// Cache key holding the ticker list for this class
    pub fn cache_key(&self) -> String {
        format!("tickers:{}", self.as_str())
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crypto" => Ok(AssetClass::Crypto),
            "us_stock" => Ok(AssetClass::UsStock),
            "in_stock" => Ok(AssetClass::InStock),
            other => Err(format!("unknown asset class: {}", other)),
        }
    }
}

/// One observed price update for a symbol. Prices are quoted in INR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: f64,
    pub asset_class: Option<AssetClass>,
    pub exchange: String,
    pub volume: Option<f64>,
    pub currency: String,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            asset_class: None,
            exchange: "unknown".to_string(),
            volume: None,
            currency: "INR".to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = Some(asset_class);
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// A scored sentiment observation, optionally tied to a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub source: String,
    pub score: f64,
    pub text: String,
    pub symbol: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl SentimentObservation {
    pub fn new(source: impl Into<String>, score: f64, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            score,
            text: text.into(),
            symbol: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}
