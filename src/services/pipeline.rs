//! Ingestion pipeline: validated observations in, published events out

use std::sync::Arc;
use tracing::debug;

use super::pubsub::{PubSubBridge, PublishRoute};
use super::tickers::TickerCatalog;
use crate::metrics::Metrics;
use crate::models::events::ServerEvent;
use crate::models::market::{PriceTick, SentimentObservation};
use crate::models::signal::SignalEvent;
use crate::signals::SignalEngine;

const UNKNOWN_EXCHANGE: &str = "unknown";

/// What happened to one ingested tick
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub tick: PriceTick,
    pub market: Option<PublishRoute>,
    pub signal: Option<SignalEvent>,
}

pub struct MarketPipeline {
    bridge: Arc<PubSubBridge>,
    engine: Arc<SignalEngine>,
    catalog: Option<Arc<TickerCatalog>>,
    metrics: Option<Arc<Metrics>>,
}

impl MarketPipeline {
    pub fn new(bridge: Arc<PubSubBridge>, engine: Arc<SignalEngine>) -> Self {
        Self {
            bridge,
            engine,
            catalog: None,
            metrics: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<TickerCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn engine(&self) -> &Arc<SignalEngine> {
        &self.engine
    }

    pub fn bridge(&self) -> &Arc<PubSubBridge> {
        &self.bridge
    }

    /// Publish the market event, run the crossover engine and publish any signal
    pub async fn ingest_tick(&self, tick: PriceTick) -> IngestOutcome {
        let tick = self.resolve(tick).await;
        let market = self.bridge.publish_event(&ServerEvent::market(&tick)).await;

        let signal = self.engine.on_price(&tick.symbol, tick.price);
        if let Some(signal) = &signal {
            if let Some(metrics) = &self.metrics {
                metrics.signals_emitted_total.inc();
            }
            self.bridge
                .publish_event(&ServerEvent::signal(signal, tick.asset_class))
                .await;
        }

        IngestOutcome {
            tick,
            market,
            signal,
        }
    }

    pub async fn ingest_sentiment(&self, observation: SentimentObservation) -> Option<PublishRoute> {
        debug!(
            source = %observation.source,
            symbol = ?observation.symbol,
            "MarketPipeline: publishing sentiment observation"
        );
        self.bridge
            .publish_event(&ServerEvent::sentiment(&observation))
            .await
    }

    /// Fill in asset class and exchange from the catalog when the tick omits them
    async fn resolve(&self, mut tick: PriceTick) -> PriceTick {
        if tick.asset_class.is_none() {
            if let Some(catalog) = &self.catalog {
                tick.asset_class = catalog.asset_class_of(&tick.symbol).await;
            }
        }

        if tick.exchange.is_empty() || tick.exchange == UNKNOWN_EXCHANGE {
            tick.exchange = tick
                .asset_class
                .map(|class| class.exchange())
                .unwrap_or(UNKNOWN_EXCHANGE)
                .to_string();
        }

        tick.currency = "INR".to_string();
        tick
    }
}
