//! Two-tier get/set-with-expiry contract
//!
//! `get` consults the shared tier first and accepts its answer without looking
//! at the local tier. When the shared tier is unreachable or has no entry the
//! local tier answers. `set` always writes locally and makes a best-effort
//! write to the shared tier; shared-tier failures never reach the caller.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::local::LocalTier;
use super::CacheError;
use crate::metrics::Metrics;

/// The shared (cross-process) cache tier
#[async_trait]
pub trait SharedTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

pub struct TtlCache {
    shared: Option<Arc<dyn SharedTier>>,
    local: LocalTier,
    metrics: Option<Arc<Metrics>>,
}

impl TtlCache {
    pub fn new(shared: Option<Arc<dyn SharedTier>>) -> Self {
        Self::with_clock(shared, Arc::new(SystemClock))
    }

    /// Local-tier-only cache
    pub fn local_only() -> Self {
        Self::new(None)
    }

    pub fn with_clock(shared: Option<Arc<dyn SharedTier>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared,
            local: LocalTier::new(clock),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn local(&self) -> &LocalTier {
        &self.local
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        if let Some(shared) = &self.shared {
            let result = shared.get(key).await;
            self.record_shared_health(result.is_ok());
            match result {
                Ok(Some(value)) => {
                    self.record_hit();
                    return Some(value);
                }
                Ok(None) => {
                    debug!(key = %key, "TtlCache: shared tier miss for {}", key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "TtlCache: shared tier read failed, using local tier");
                }
            }
        }

        match self.local.get(key) {
            Some(value) => {
                self.record_hit();
                Some(value)
            }
            None => {
                if let Some(metrics) = &self.metrics {
                    metrics.cache_misses_total.inc();
                }
                None
            }
        }
    }

    pub async fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.local.set(key, value, ttl);

        if let Some(shared) = &self.shared {
            let result = shared.set(key, value, ttl).await;
            self.record_shared_health(result.is_ok());
            if let Err(e) = result {
                warn!(key = %key, error = %e, "TtlCache: shared tier write failed, kept local copy");
            }
        }
    }

    /// Read and decode a JSON value. Undecodable entries read as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "TtlCache: cached value is not valid JSON");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await;
        Ok(())
    }

    /// Mirror the outcome of the latest shared-tier call into `cache_connected`
    fn record_shared_health(&self, reachable: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_connected.set(if reachable { 1.0 } else { 0.0 });
        }
    }

    fn record_hit(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.cache_hits_total.inc();
        }
    }
}
