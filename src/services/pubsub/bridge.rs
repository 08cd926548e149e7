//! Publish/subscribe bridge
//!
//! `publish` checks broker reachability on every call. When the broker answers
//! and the listener holds an active subscription, the event goes through the
//! broker and comes back to local endpoints via the listener, exactly like
//! events published by other processes. Otherwise it is delivered directly
//! through the [`ConnectionRegistry`].
//!
//! A broker publish that times out may still have reached the broker, so it is
//! reported as [`PublishRoute::Unconfirmed`] and not delivered locally. Only an
//! explicit broker error falls back to local delivery.

use backon::{ExponentialBuilder, Retryable};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::broker::{Broker, BrokerError, BrokerMessage, Channel};
use crate::metrics::Metrics;
use crate::models::events::ServerEvent;
use crate::services::websocket::{ConnectionRegistry, DeliveryReport};

/// Delay before a new subscription round once retries are exhausted
const RESUBSCRIBE_PAUSE: Duration = Duration::from_secs(30);

/// Which path a published event took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishRoute {
    Broker,
    Local(DeliveryReport),
    /// Broker publish timed out; the event may or may not have been fanned out
    Unconfirmed,
}

pub struct PubSubBridge {
    registry: Arc<ConnectionRegistry>,
    broker: Option<Arc<dyn Broker>>,
    listening: Arc<AtomicBool>,
    broker_timeout: Duration,
    metrics: Option<Arc<Metrics>>,
    cancel: CancellationToken,
    handle: RwLock<Option<JoinHandle<()>>>,
}

impl PubSubBridge {
    pub fn new(registry: Arc<ConnectionRegistry>, broker: Option<Arc<dyn Broker>>) -> Self {
        Self {
            registry,
            broker,
            listening: Arc::new(AtomicBool::new(false)),
            broker_timeout: Duration::from_secs(1),
            metrics: None,
            cancel: CancellationToken::new(),
            handle: RwLock::new(None),
        }
    }

    /// Bridge with no external broker; every publish is delivered locally
    pub fn local_only(registry: Arc<ConnectionRegistry>) -> Self {
        Self::new(registry, None)
    }

    pub fn with_broker_timeout(mut self, timeout: Duration) -> Self {
        self.broker_timeout = timeout;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Whether the listener currently holds a broker subscription
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Serialize and publish an event on its channel, targeted by its symbol
    pub async fn publish_event(&self, event: &ServerEvent) -> Option<PublishRoute> {
        let Some(channel) = event.channel() else {
            warn!("PubSubBridge: event has no broker channel, not publishing");
            return None;
        };

        match event.to_json() {
            Ok(payload) => Some(self.publish(channel, &payload, event.symbol()).await),
            Err(e) => {
                error!(channel = %channel, error = %e, "PubSubBridge: failed to encode event");
                None
            }
        }
    }

    pub async fn publish(&self, channel: Channel, payload: &str, symbol: Option<&str>) -> PublishRoute {
        if let Some(broker) = self.reachable_broker().await {
            match tokio::time::timeout(self.broker_timeout, broker.publish(channel, payload)).await {
                Ok(Ok(())) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.broker_publishes_total.inc();
                    }
                    return PublishRoute::Broker;
                }
                Ok(Err(e)) => {
                    warn!(channel = %channel, error = %e, "PubSubBridge: broker publish failed, delivering locally");
                }
                Err(_) => {
                    warn!(channel = %channel, timeout = ?self.broker_timeout, "PubSubBridge: broker publish timed out, outcome unknown");
                    return PublishRoute::Unconfirmed;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.local_fallback_publishes_total.inc();
        }
        PublishRoute::Local(self.registry.deliver(payload, symbol))
    }

    async fn reachable_broker(&self) -> Option<&Arc<dyn Broker>> {
        let broker = self.broker.as_ref()?;
        if !self.is_listening() {
            return None;
        }

        match tokio::time::timeout(self.broker_timeout, broker.ping()).await {
            Ok(Ok(())) => Some(broker),
            Ok(Err(e)) => {
                debug!(error = %e, "PubSubBridge: broker unreachable");
                None
            }
            Err(_) => {
                debug!("PubSubBridge: broker ping timed out");
                None
            }
        }
    }

    /// Spawn the background listener. No-op without a broker or if already running.
    pub async fn start_listener(&self) {
        let Some(broker) = self.broker.clone() else {
            info!("PubSubBridge: no broker configured, using direct local delivery");
            return;
        };

        let mut handle = self.handle.write().await;
        if handle.is_some() {
            return;
        }

        let listener = Listener {
            broker,
            registry: self.registry.clone(),
            listening: self.listening.clone(),
            metrics: self.metrics.clone(),
            cancel: self.cancel.clone(),
        };
        *handle = Some(tokio::spawn(async move { listener.run().await }));
        info!("PubSubBridge: listener started");
    }

    /// Cancel the listener and wait for it to exit
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.write().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "PubSubBridge: listener task ended abnormally");
            }
            info!("PubSubBridge: listener stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.handle.read().await.is_some()
    }
}

#[derive(Clone)]
struct Listener {
    broker: Arc<dyn Broker>,
    registry: Arc<ConnectionRegistry>,
    listening: Arc<AtomicBool>,
    metrics: Option<Arc<Metrics>>,
    cancel: CancellationToken,
}

impl Listener {
    async fn run(&self) {
        while !self.cancel.is_cancelled() {
            let subscribed = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.subscribe_with_retry() => result,
            };

            let mut stream = match subscribed {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "PubSubBridge: broker subscription failed, retrying in {:?}", RESUBSCRIBE_PAUSE);
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(RESUBSCRIBE_PAUSE) => continue,
                    }
                }
            };

            self.set_listening(true);
            info!(channels = ?Channel::ALL.map(|c| c.as_str()), "PubSubBridge: subscribed to broker channels");

            loop {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    next = stream.next() => match next {
                        Some(message) => self.route(message),
                        None => {
                            warn!("PubSubBridge: broker stream ended, falling back to local delivery");
                            break;
                        }
                    },
                }
            }

            self.set_listening(false);
        }

        self.set_listening(false);
        debug!("PubSubBridge: listener exiting");
    }

    async fn subscribe_with_retry(&self) -> Result<super::broker::BrokerStream, BrokerError> {
        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(10))
            .with_max_times(5);

        (|| async { self.broker.subscribe(&Channel::ALL).await })
            .retry(backoff)
            .notify(|e: &BrokerError, delay: Duration| {
                debug!(error = %e, "PubSubBridge: subscribe attempt failed, retrying in {:?}", delay);
            })
            .await
    }

    /// Rebroadcast one inbound message, targeted by its `symbol` field when present
    fn route(&self, message: BrokerMessage) {
        if let Some(metrics) = &self.metrics {
            metrics.broker_messages_received_total.inc();
        }

        let symbol = match serde_json::from_str::<serde_json::Value>(&message.payload) {
            Ok(value) => value.get("symbol").and_then(|s| s.as_str()).map(str::to_string),
            Err(e) => {
                warn!(channel = %message.channel, error = %e, "PubSubBridge: malformed broker payload, broadcasting untargeted");
                if let Some(metrics) = &self.metrics {
                    metrics.malformed_broker_messages_total.inc();
                }
                None
            }
        };

        self.registry.deliver(&message.payload, symbol.as_deref());
    }

    fn set_listening(&self, listening: bool) {
        self.listening.store(listening, Ordering::SeqCst);
        if let Some(metrics) = &self.metrics {
            metrics.broker_connected.set(if listening { 1.0 } else { 0.0 });
        }
    }
}
