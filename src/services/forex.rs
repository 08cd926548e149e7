//! USD→INR exchange rate with cache, backup API and static fallback

use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::FetchError;
use crate::cache::TtlCache;
use crate::config::Settings;
use crate::models::round2;

pub const FOREX_CACHE_KEY: &str = "forex:usd_inr";

/// Rate used when every upstream source fails
pub const FALLBACK_USD_INR: f64 = 83.50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RatesResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

impl RatesResponse {
    fn inr(&self) -> Result<f64, FetchError> {
        self.rates
            .get("INR")
            .copied()
            .ok_or(FetchError::MissingField("rates.INR"))
    }
}

pub struct ForexService {
    client: reqwest::Client,
    cache: Arc<TtlCache>,
    primary_url: String,
    backup_url: String,
    ttl: Duration,
}

impl ForexService {
    pub fn new(
        cache: Arc<TtlCache>,
        primary_url: impl Into<String>,
        backup_url: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            primary_url: primary_url.into(),
            backup_url: backup_url.into(),
            ttl,
        }
    }

    pub fn from_settings(settings: &Settings, cache: Arc<TtlCache>) -> Self {
        Self::new(
            cache,
            settings.forex_api_url.clone(),
            settings.forex_backup_api_url.clone(),
            settings.cache_ttl,
        )
    }

    /// Current rate: cached value if present, otherwise a fresh lookup
    pub async fn usd_inr_rate(&self) -> f64 {
        if let Some(rate) = self.cache.get_json::<f64>(FOREX_CACHE_KEY).await {
            debug!(rate = rate, "ForexService: cache hit for USD/INR");
            return rate;
        }
        self.refresh().await
    }

    /// Fetch from upstream (primary, then backup, then fallback) and cache the result
    pub async fn refresh(&self) -> f64 {
        let rate = match self.fetch_primary().await {
            Ok(rate) => rate,
            Err(e) => {
                warn!(error = %e, "ForexService: primary rate API failed, trying backup");
                match self.fetch_backup().await {
                    Ok(rate) => rate,
                    Err(e) => {
                        warn!(error = %e, "ForexService: backup rate API failed, using fallback {}", FALLBACK_USD_INR);
                        FALLBACK_USD_INR
                    }
                }
            }
        };

        if let Err(e) = self.cache.set_json(FOREX_CACHE_KEY, &rate, self.ttl).await {
            warn!(error = %e, "ForexService: failed to cache USD/INR rate");
        }
        info!(rate = rate, "ForexService: USD/INR rate refreshed");
        rate
    }

    pub async fn convert_to_inr(&self, value_usd: f64) -> f64 {
        round2(value_usd * self.usd_inr_rate().await)
    }

    async fn fetch_primary(&self) -> Result<f64, FetchError> {
        let url = format!("{}/v6/latest/USD", self.primary_url.trim_end_matches('/'));
        let response: RatesResponse = self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.result.as_deref() {
            Some("success") => response.inr(),
            other => Err(FetchError::Rejected(format!(
                "result = {}",
                other.unwrap_or("missing")
            ))),
        }
    }

    async fn fetch_backup(&self) -> Result<f64, FetchError> {
        let url = format!("{}/latest", self.backup_url.trim_end_matches('/'));
        let response: RatesResponse = self
            .client
            .get(&url)
            .query(&[("from", "USD"), ("to", "INR")])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.inr()
    }
}
