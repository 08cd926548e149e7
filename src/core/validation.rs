//! Boundary validation for ingestion requests
//!
//! Everything past this module assumes symbols are normalized, prices and
//! scores are in range and free text is escaped.

use serde::Deserialize;
use thiserror::Error;

use crate::models::market::{AssetClass, PriceTick, SentimentObservation};

pub const MAX_SYMBOL_LEN: usize = 20;
pub const MAX_PRICE: f64 = 1_000_000_000.0;
pub const MAX_TEXT_LEN: usize = 5000;
pub const MAX_SOURCE_LEN: usize = 100;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("symbol must be between 1 and 20 characters")]
    SymbolLength,
    #[error("symbol can only contain letters, numbers, hyphens, and underscores")]
    SymbolCharacters,
    #[error("price must be greater than zero and at most 1e9")]
    PriceRange,
    #[error("unknown asset class: {0}")]
    AssetClass(String),
    #[error("volume must be a non-negative number")]
    Volume,
    #[error("sentiment score must be between -1 and 1")]
    ScoreRange,
    #[error("{field} exceeds maximum length of {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Body of `POST /ingest/market`
#[derive(Debug, Clone, Deserialize)]
pub struct MarketInput {
    pub symbol: String,
    pub price: f64,
    #[serde(default)]
    pub asset_class: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub volume: Option<f64>,
}

impl MarketInput {
    pub fn validate(self) -> Result<PriceTick, ValidationError> {
        let symbol = validate_symbol(&self.symbol)?;
        let price = validate_price(self.price)?;

        let mut tick = PriceTick::new(symbol, price);
        if let Some(raw) = self.asset_class.as_deref().filter(|s| !s.is_empty()) {
            let asset_class = raw
                .parse::<AssetClass>()
                .map_err(|_| ValidationError::AssetClass(raw.to_string()))?;
            tick = tick.with_asset_class(asset_class);
        }
        if let Some(exchange) = self.exchange.as_deref().filter(|s| !s.trim().is_empty()) {
            tick = tick.with_exchange(sanitize(exchange, "exchange", MAX_SOURCE_LEN)?);
        }
        if let Some(volume) = self.volume {
            if !volume.is_finite() || volume < 0.0 {
                return Err(ValidationError::Volume);
            }
            tick = tick.with_volume(volume);
        }
        Ok(tick)
    }
}

/// Body of `POST /ingest/sentiment`
#[derive(Debug, Clone, Deserialize)]
pub struct SentimentInput {
    pub source: String,
    #[serde(alias = "score")]
    pub sentiment_score: f64,
    #[serde(alias = "text")]
    pub raw_text: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

impl SentimentInput {
    pub fn validate(self) -> Result<SentimentObservation, ValidationError> {
        let source = sanitize(&self.source, "source", MAX_SOURCE_LEN)?;
        if source.is_empty() {
            return Err(ValidationError::Missing("source"));
        }
        let score = validate_score(self.sentiment_score)?;
        let text = sanitize(&self.raw_text, "text", MAX_TEXT_LEN)?;

        let observation = SentimentObservation::new(source, score, text);
        match self.symbol.as_deref().filter(|s| !s.is_empty()) {
            Some(symbol) => Ok(observation.with_symbol(validate_symbol(symbol)?)),
            None => Ok(observation),
        }
    }
}

/// Uppercased symbol of 1-20 characters from `[A-Za-z0-9_-]`
pub fn validate_symbol(symbol: &str) -> Result<String, ValidationError> {
    if symbol.is_empty() || symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(ValidationError::SymbolLength);
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::SymbolCharacters);
    }
    Ok(symbol.to_ascii_uppercase())
}

pub fn validate_price(price: f64) -> Result<f64, ValidationError> {
    if !price.is_finite() || price <= 0.0 || price > MAX_PRICE {
        return Err(ValidationError::PriceRange);
    }
    Ok(price)
}

pub fn validate_score(score: f64) -> Result<f64, ValidationError> {
    if !score.is_finite() || !(-1.0..=1.0).contains(&score) {
        return Err(ValidationError::ScoreRange);
    }
    Ok(score)
}

/// Length-check, trim and HTML-escape free text
pub fn sanitize(text: &str, field: &'static str, max: usize) -> Result<String, ValidationError> {
    if text.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(escape_html(text.trim()))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}
