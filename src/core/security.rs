//! HTTP hardening: security headers, CORS allowlist and per-client rate limits

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
    Router,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};
use serde_json::json;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::warn;

use crate::config::Settings;

/// Keyed state is pruned once this many clients are tracked
const MAX_TRACKED_CLIENTS: usize = 10_000;

type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Requests-per-minute quota tracked per client
pub struct RateLimit {
    limiter: KeyedLimiter,
    clock: DefaultClock,
}

impl RateLimit {
    pub fn per_minute(requests: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(requests).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        }
    }

    /// `Err` carries how long the client has to wait
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
        }

        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Separate quotas for read routes and the ingestion routes the worker calls
pub struct RateLimits {
    pub public: RateLimit,
    pub ingest: RateLimit,
}

impl RateLimits {
    pub fn new(public_per_minute: u32, ingest_per_minute: u32) -> Self {
        Self {
            public: RateLimit::per_minute(public_per_minute),
            ingest: RateLimit::per_minute(ingest_per_minute),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.public_rate_limit, settings.ingest_rate_limit)
    }
}

/// First `X-Forwarded-For` hop, else the peer address, else `"unknown"`
pub fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(client) = forwarded {
        return client.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn public_rate_limit(
    State(limits): State<Arc<RateLimits>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&limits.public, request, next).await
}

pub async fn ingest_rate_limit(
    State(limits): State<Arc<RateLimits>>,
    request: Request,
    next: Next,
) -> Response {
    enforce(&limits.ingest, request, next).await
}

async fn enforce(limit: &RateLimit, request: Request, next: Next) -> Response {
    let client = client_key(&request);
    match limit.check(&client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!(
                client = %client,
                path = %request.uri().path(),
                "Rate limit exceeded for {}",
                client
            );
            too_many_requests(wait)
        }
    }
}

fn too_many_requests(wait: Duration) -> Response {
    let retry_after = (wait.as_millis() as u64).div_ceil(1000).max(1);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(json!({
            "error": "Rate limit exceeded",
            "message": "Too many requests. Please slow down and try again later.",
            "retry_after_seconds": retry_after,
        })),
    )
        .into_response()
}

/// Static security headers on every response
pub fn with_security_headers<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let headers = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::CONTENT_SECURITY_POLICY, "default-src 'self'"),
        (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    ];

    headers.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::overriding(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

/// HSTS for requests that reached a TLS-terminating proxy over HTTPS
pub async fn strict_transport_security(request: Request, next: Next) -> Response {
    let https = request
        .headers()
        .get(HeaderName::from_static("x-forwarded-proto"))
        .and_then(|v| v.to_str().ok())
        .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

    let mut response = next.run(request).await;
    if https {
        response.headers_mut().insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }
    response
}

/// CORS restricted to `origins`. Unparseable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(AllowHeaders::mirror_request())
        .max_age(Duration::from_secs(600))
}
