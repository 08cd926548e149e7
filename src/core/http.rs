//! HTTP endpoint server using Axum

use axum::{
    extract::{ws::WebSocketUpgrade, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Map, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use super::security::{
    cors_layer, ingest_rate_limit, public_rate_limit, strict_transport_security,
    with_security_headers, RateLimits,
};
use super::validation::{MarketInput, SentimentInput, ValidationError};
use crate::metrics::Metrics;
use crate::models::market::AssetClass;
use crate::services::websocket::{run_session, ConnectionRegistry};
use crate::services::{ForexService, MarketPipeline, PublishRoute, TickerCatalog};

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<RwLock<HealthStatus>>,
    pub metrics: Arc<Metrics>,
    pub start_time: Arc<Instant>,
    pub registry: Arc<ConnectionRegistry>,
    pub pipeline: Arc<MarketPipeline>,
    pub forex: Arc<ForexService>,
    pub catalog: Arc<TickerCatalog>,
    pub endpoint_buffer: usize,
    pub limits: Arc<RateLimits>,
    pub allowed_origins: Arc<Vec<String>>,
    pub max_body_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct HealthStatus {
    pub status: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

type ApiError = (StatusCode, Json<Value>);

fn unprocessable(error: ValidationError) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": error.to_string() })),
    )
}

fn route_name(route: &Option<PublishRoute>) -> &'static str {
    match route {
        Some(PublishRoute::Broker) => "broker",
        Some(PublishRoute::Local(_)) => "local",
        Some(PublishRoute::Unconfirmed) => "unconfirmed",
        None => "none",
    }
}

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    let health = state.health.read().await;
    let uptime_seconds = state.start_time.elapsed().as_secs();
    Ok(Json(json!({
        "status": health.status,
        "uptime_seconds": uptime_seconds,
        "service": "tradesentient-realtime",
        "connections": state.registry.len(),
        "broker_listening": state.pipeline.bridge().is_listening(),
    })))
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .export()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Upgrade to a delivery endpoint
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let buffer = state.endpoint_buffer;
    ws.on_upgrade(move |socket| run_session(socket, registry, buffer))
}

/// Middleware to track HTTP request metrics
async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    state.metrics.http_requests_in_flight.inc();

    let response = next.run(request).await;
    let status = response.status();
    let duration = start.elapsed();

    state.metrics.http_requests_in_flight.dec();
    state.metrics.http_requests_total.inc();
    state
        .metrics
        .http_request_duration_seconds
        .observe(duration.as_secs_f64());

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = duration.as_millis(),
            "HTTP request error"
        );
    }

    response
}

/// Ticker lists grouped by asset class
async fn list_tickers(State(state): State<AppState>) -> Json<Value> {
    let mut classes = Map::new();
    for asset_class in AssetClass::ALL {
        let tickers = state.catalog.tickers(asset_class).await;
        let assets: Vec<Value> = tickers
            .iter()
            .map(|t| json!({ "symbol": t.symbol, "name": t.name }))
            .collect();

        classes.insert(
            asset_class.as_str().to_string(),
            json!({
                "label": asset_class.label(),
                "exchange": asset_class.exchange(),
                "currency": "INR",
                "count": assets.len(),
                "assets": assets,
            }),
        );
    }
    Json(Value::Object(classes))
}

async fn usd_inr(State(state): State<AppState>) -> Json<Value> {
    let rate = state.forex.usd_inr_rate().await;
    Json(json!({ "usd_inr": rate, "currency": "INR" }))
}

async fn ingest_market(
    State(state): State<AppState>,
    Json(input): Json<MarketInput>,
) -> Result<Json<Value>, ApiError> {
    let tick = input.validate().map_err(unprocessable)?;
    let outcome = state.pipeline.ingest_tick(tick).await;

    Ok(Json(json!({
        "symbol": outcome.tick.symbol,
        "price": outcome.tick.price,
        "asset_class": outcome.tick.asset_class,
        "exchange": outcome.tick.exchange,
        "volume": outcome.tick.volume,
        "currency": outcome.tick.currency,
        "timestamp": outcome.tick.timestamp,
        "route": route_name(&outcome.market),
        "signal": outcome.signal,
    })))
}

async fn ingest_sentiment(
    State(state): State<AppState>,
    Json(input): Json<SentimentInput>,
) -> Result<Json<Value>, ApiError> {
    let observation = input.validate().map_err(unprocessable)?;
    let route = state.pipeline.ingest_sentiment(observation.clone()).await;

    Ok(Json(json!({
        "source": observation.source,
        "sentiment_score": observation.score,
        "raw_text": observation.text,
        "symbol": observation.symbol,
        "timestamp": observation.timestamp,
        "route": route_name(&route),
    })))
}

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/tickers", get(list_tickers))
        .route("/forex/usd-inr", get(usd_inr))
        .route_layer(axum::middleware::from_fn_with_state(
            state.limits.clone(),
            public_rate_limit,
        ));

    let ingest = Router::new()
        .route("/ingest/market", post(ingest_market))
        .route("/ingest/sentiment", post(ingest_sentiment))
        .route_layer(axum::middleware::from_fn_with_state(
            state.limits.clone(),
            ingest_rate_limit,
        ));

    let router = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/ws", get(ws_handler))
        .merge(public)
        .merge(ingest)
        .layer(RequestBodyLimitLayer::new(state.max_body_bytes))
        .layer(cors_layer(&state.allowed_origins))
        .layer(axum::middleware::from_fn(strict_transport_security));

    with_security_headers(router)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                        .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
                )
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    metrics_middleware,
                )),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!(port = port, "HTTP server listening on port {}", port);
    info!("WebSocket endpoint available at ws://0.0.0.0:{}/ws", port);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
