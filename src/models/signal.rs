//! Crossover signal types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalType::Buy => "BUY",
            SignalType::Sell => "SELL",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification derived from comparing the short and long averages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stance {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl Stance {
    pub fn from_averages(short_average: f64, long_average: f64) -> Self {
        if short_average > long_average {
            Stance::Bullish
        } else if short_average < long_average {
            Stance::Bearish
        } else {
            Stance::Neutral
        }
    }
}

/// A BUY/SELL crossover event. Numeric fields are rounded to 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub signal_type: SignalType,
    pub symbol: String,
    pub price: f64,
    pub short_average: f64,
    pub long_average: f64,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}

/// Round to 2 decimal places for outward-facing fields
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
