//! Prometheus metrics for the distribution pipeline

use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,

    // HTTP
    pub http_requests_total: Counter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: Gauge,

    // Connection registry
    pub endpoints_connected: Gauge,
    pub deliveries_total: Counter,
    pub endpoints_evicted_total: Counter,

    // Pub/sub bridge
    pub broker_connected: Gauge,
    pub broker_publishes_total: Counter,
    pub local_fallback_publishes_total: Counter,
    pub broker_messages_received_total: Counter,
    pub malformed_broker_messages_total: Counter,

    // Signal engine
    pub signals_emitted_total: Counter,

    // TTL cache
    pub cache_connected: Gauge,
    pub cache_hits_total: Counter,
    pub cache_misses_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            Counter::with_opts(Opts::new("http_requests_total", "Total HTTP requests"))?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ))?;
        let http_requests_in_flight = Gauge::with_opts(Opts::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        ))?;

        let endpoints_connected = Gauge::with_opts(Opts::new(
            "endpoints_connected",
            "Delivery endpoints currently registered",
        ))?;
        let deliveries_total = Counter::with_opts(Opts::new(
            "deliveries_total",
            "Payloads handed to delivery endpoints",
        ))?;
        let endpoints_evicted_total = Counter::with_opts(Opts::new(
            "endpoints_evicted_total",
            "Endpoints removed after a failed delivery",
        ))?;

        let broker_connected = Gauge::with_opts(Opts::new(
            "broker_connected",
            "Whether the broker listener is subscribed (1) or not (0)",
        ))?;
        let broker_publishes_total = Counter::with_opts(Opts::new(
            "broker_publishes_total",
            "Events published through the external broker",
        ))?;
        let local_fallback_publishes_total = Counter::with_opts(Opts::new(
            "local_fallback_publishes_total",
            "Events delivered directly because the broker was unavailable",
        ))?;
        let broker_messages_received_total = Counter::with_opts(Opts::new(
            "broker_messages_received_total",
            "Messages received by the broker listener",
        ))?;
        let malformed_broker_messages_total = Counter::with_opts(Opts::new(
            "malformed_broker_messages_total",
            "Broker messages without a parseable symbol",
        ))?;

        let signals_emitted_total = Counter::with_opts(Opts::new(
            "signals_emitted_total",
            "Crossover signals emitted by the signal engine",
        ))?;

        let cache_connected = Gauge::with_opts(Opts::new(
            "cache_connected",
            "Whether the latest shared cache tier call succeeded (1) or failed (0)",
        ))?;
        let cache_hits_total =
            Counter::with_opts(Opts::new("cache_hits_total", "TTL cache lookups that hit"))?;
        let cache_misses_total = Counter::with_opts(Opts::new(
            "cache_misses_total",
            "TTL cache lookups that missed both tiers",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(endpoints_connected.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(endpoints_evicted_total.clone()))?;
        registry.register(Box::new(broker_connected.clone()))?;
        registry.register(Box::new(broker_publishes_total.clone()))?;
        registry.register(Box::new(local_fallback_publishes_total.clone()))?;
        registry.register(Box::new(broker_messages_received_total.clone()))?;
        registry.register(Box::new(malformed_broker_messages_total.clone()))?;
        registry.register(Box::new(signals_emitted_total.clone()))?;
        registry.register(Box::new(cache_connected.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            endpoints_connected,
            deliveries_total,
            endpoints_evicted_total,
            broker_connected,
            broker_publishes_total,
            local_fallback_publishes_total,
            broker_messages_received_total,
            malformed_broker_messages_total,
            signals_emitted_total,
            cache_connected,
            cache_hits_total,
            cache_misses_total,
        })
    }

    /// Render all registered metrics in the Prometheus text format
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
