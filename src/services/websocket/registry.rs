//! Connection registry: live delivery endpoints and their topic filters
//!
//! Delivery never blocks: each endpoint owns a bounded queue and a failed
//! hand-off (queue full or receiver gone) evicts that endpoint on the spot.
//! All sends run under the registry lock, so a single endpoint observes
//! payloads in the order `deliver` was called.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics::Metrics;

pub type EndpointId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("endpoint queue is full")]
    Backpressure,
    #[error("endpoint transport is closed")]
    Closed,
    #[error("endpoint {0} is not registered")]
    UnknownEndpoint(EndpointId),
}

/// Non-blocking hand-off to one endpoint's transport
pub trait EndpointSink: Send + Sync {
    fn try_deliver(&self, payload: &str) -> Result<(), DeliveryError>;
}

impl EndpointSink for mpsc::Sender<String> {
    fn try_deliver(&self, payload: &str) -> Result<(), DeliveryError> {
        self.try_send(payload.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Topic filter of one endpoint. `All` is its own state, distinct from an empty set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionFilter {
    All,
    Symbols(HashSet<String>),
}

impl SubscriptionFilter {
    pub fn symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SubscriptionFilter::Symbols(symbols.into_iter().map(Into::into).collect())
    }

    /// An untargeted payload (`symbol == None`) matches every filter
    pub fn matches(&self, symbol: Option<&str>) -> bool {
        match (self, symbol) {
            (SubscriptionFilter::All, _) | (_, None) => true,
            (SubscriptionFilter::Symbols(set), Some(symbol)) => set.contains(symbol),
        }
    }
}

struct Endpoint {
    sink: Arc<dyn EndpointSink>,
    filter: SubscriptionFilter,
}

/// Result of one `deliver` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub evicted: Vec<EndpointId>,
}

pub struct ConnectionRegistry {
    endpoints: Mutex<HashMap<EndpointId, Endpoint>>,
    next_id: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register an endpoint. New endpoints receive everything until they subscribe.
    pub fn register(&self, sink: Arc<dyn EndpointSink>) -> EndpointId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let count = {
            let mut endpoints = self.endpoints.lock();
            endpoints.insert(
                id,
                Endpoint {
                    sink,
                    filter: SubscriptionFilter::All,
                },
            );
            endpoints.len()
        };

        self.set_connected_gauge(count);
        debug!(endpoint_id = id, "ConnectionRegistry: registered endpoint {}", id);
        id
    }

    /// Register an endpoint backed by a bounded queue and return its receiving half
    pub fn register_channel(&self, buffer: usize) -> (EndpointId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let id = self.register(Arc::new(tx));
        (id, rx)
    }

    /// Remove an endpoint. Returns `false` if it was already gone.
    pub fn unregister(&self, id: EndpointId) -> bool {
        let (removed, count) = {
            let mut endpoints = self.endpoints.lock();
            let removed = endpoints.remove(&id).is_some();
            (removed, endpoints.len())
        };

        if removed {
            self.set_connected_gauge(count);
            debug!(endpoint_id = id, "ConnectionRegistry: unregistered endpoint {}", id);
        }
        removed
    }

    pub fn set_filter(&self, id: EndpointId, filter: SubscriptionFilter) -> bool {
        match self.endpoints.lock().get_mut(&id) {
            Some(endpoint) => {
                endpoint.filter = filter;
                true
            }
            None => false,
        }
    }

    /// Add one symbol to the endpoint's set, replacing an `All` filter with `{symbol}`
    pub fn add_symbol(&self, id: EndpointId, symbol: &str) -> bool {
        let mut endpoints = self.endpoints.lock();
        let Some(endpoint) = endpoints.get_mut(&id) else {
            return false;
        };

        if let SubscriptionFilter::Symbols(set) = &mut endpoint.filter {
            set.insert(symbol.to_string());
        } else {
            endpoint.filter = SubscriptionFilter::symbols([symbol]);
        }
        true
    }

    pub fn filter(&self, id: EndpointId) -> Option<SubscriptionFilter> {
        self.endpoints.lock().get(&id).map(|e| e.filter.clone())
    }

    /// Hand `payload` to every endpoint whose filter matches `symbol`.
    ///
    /// Endpoints whose hand-off fails are removed before the lock is released.
    pub fn deliver(&self, payload: &str, symbol: Option<&str>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let remaining = {
            let mut endpoints = self.endpoints.lock();
            for (id, endpoint) in endpoints.iter() {
                if !endpoint.filter.matches(symbol) {
                    continue;
                }
                match endpoint.sink.try_deliver(payload) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        debug!(endpoint_id = *id, error = %e, "ConnectionRegistry: delivery failed, evicting endpoint {}", id);
                        report.evicted.push(*id);
                    }
                }
            }
            for id in &report.evicted {
                endpoints.remove(id);
            }
            endpoints.len()
        };

        if let Some(metrics) = &self.metrics {
            metrics.deliveries_total.inc_by(report.delivered as f64);
            if !report.evicted.is_empty() {
                metrics.endpoints_evicted_total.inc_by(report.evicted.len() as f64);
                metrics.endpoints_connected.set(remaining as f64);
            }
        }
        report
    }

    /// Send a payload to a single endpoint regardless of its filter
    pub fn send_to(&self, id: EndpointId, payload: &str) -> Result<(), DeliveryError> {
        let (result, count) = {
            let mut endpoints = self.endpoints.lock();
            let Some(endpoint) = endpoints.get(&id) else {
                return Err(DeliveryError::UnknownEndpoint(id));
            };
            let result = endpoint.sink.try_deliver(payload);
            if result.is_err() {
                endpoints.remove(&id);
            }
            (result, endpoints.len())
        };

        if let Err(e) = &result {
            debug!(endpoint_id = id, error = %e, "ConnectionRegistry: reply failed, evicting endpoint {}", id);
            if let Some(metrics) = &self.metrics {
                metrics.endpoints_evicted_total.inc();
            }
            self.set_connected_gauge(count);
        }
        result
    }

    pub fn contains(&self, id: EndpointId) -> bool {
        self.endpoints.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.endpoints.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.lock().is_empty()
    }

    fn set_connected_gauge(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.endpoints_connected.set(count as f64);
        }
    }
}
