//! Service wiring shared by the binaries

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::http::{AppState, HealthStatus};
use super::security::RateLimits;
use crate::cache::{RedisCache, SharedTier, TtlCache};
use crate::config::Settings;
use crate::metrics::Metrics;
use crate::services::pubsub::{Broker, PubSubBridge, RedisBroker};
use crate::services::websocket::ConnectionRegistry;
use crate::services::{ForexService, MarketPipeline, TickerCatalog};
use crate::signals::SignalEngine;

/// Every long-lived component of a running service
pub struct ServiceContext {
    pub settings: Settings,
    pub metrics: Arc<Metrics>,
    pub cache: Arc<TtlCache>,
    pub registry: Arc<ConnectionRegistry>,
    pub bridge: Arc<PubSubBridge>,
    pub engine: Arc<SignalEngine>,
    pub catalog: Arc<TickerCatalog>,
    pub forex: Arc<ForexService>,
    pub pipeline: Arc<MarketPipeline>,
}

impl ServiceContext {
    /// Build the context with Redis as shared cache tier and broker.
    ///
    /// Redis being down is not an error: both adapters connect lazily and the
    /// cache and bridge fall back to local behavior until it answers.
    pub async fn connect(settings: Settings) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(Metrics::new()?);

        let shared: Option<Arc<dyn SharedTier>> =
            match RedisCache::new(&settings.redis_url, settings.broker_timeout) {
                Ok(cache) => {
                    if cache.is_reachable().await {
                        info!("Redis reachable, shared cache tier enabled");
                        metrics.cache_connected.set(1.0);
                    } else {
                        warn!("Redis not reachable, serving from local cache tier until it is");
                    }
                    Some(Arc::new(cache))
                }
                Err(e) => {
                    warn!(error = %e, "Redis cache disabled");
                    None
                }
            };

        let broker: Option<Arc<dyn Broker>> =
            match RedisBroker::new(&settings.redis_url, settings.broker_timeout) {
                Ok(broker) => Some(Arc::new(broker)),
                Err(e) => {
                    warn!(error = %e, "Redis broker disabled, using direct local delivery");
                    None
                }
            };

        Ok(Self::assemble(settings, metrics, shared, broker))
    }

    /// Build the context with no external infrastructure
    pub fn local(settings: Settings) -> Result<Self, prometheus::Error> {
        let metrics = Arc::new(Metrics::new()?);
        Ok(Self::assemble(settings, metrics, None, None))
    }

    pub fn assemble(
        settings: Settings,
        metrics: Arc<Metrics>,
        shared: Option<Arc<dyn SharedTier>>,
        broker: Option<Arc<dyn Broker>>,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(shared).with_metrics(metrics.clone()));
        let registry = Arc::new(ConnectionRegistry::new().with_metrics(metrics.clone()));
        let bridge = Arc::new(
            PubSubBridge::new(registry.clone(), broker)
                .with_broker_timeout(settings.broker_timeout)
                .with_metrics(metrics.clone()),
        );

        let engine = match SignalEngine::new(settings.short_window, settings.long_window) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                warn!(error = %e, "Invalid signal windows, using SMA10/SMA30");
                Arc::new(SignalEngine::default())
            }
        };

        let catalog = Arc::new(TickerCatalog::from_settings(&settings, cache.clone()));
        let forex = Arc::new(ForexService::from_settings(&settings, cache.clone()));
        let pipeline = Arc::new(
            MarketPipeline::new(bridge.clone(), engine.clone())
                .with_catalog(catalog.clone())
                .with_metrics(metrics.clone()),
        );

        Self {
            settings,
            metrics,
            cache,
            registry,
            bridge,
            engine,
            catalog,
            forex,
            pipeline,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            health: Arc::new(RwLock::new(HealthStatus::default())),
            metrics: self.metrics.clone(),
            start_time: Arc::new(Instant::now()),
            registry: self.registry.clone(),
            pipeline: self.pipeline.clone(),
            forex: self.forex.clone(),
            catalog: self.catalog.clone(),
            endpoint_buffer: self.settings.endpoint_buffer,
            limits: Arc::new(RateLimits::from_settings(&self.settings)),
            allowed_origins: Arc::new(self.settings.allowed_origins.clone()),
            max_body_bytes: self.settings.max_body_bytes,
        }
    }

    /// Start background tasks owned by the context
    pub async fn start(&self) {
        self.bridge.start_listener().await;
    }

    pub async fn shutdown(&self) {
        self.bridge.stop().await;
        info!("Service context shut down");
    }
}
