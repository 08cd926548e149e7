//! Test utilities for worker integration tests

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tradesentient::cache::TtlCache;
use tradesentient::services::{ForexService, TickerCatalog};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TTL: Duration = Duration::from_secs(900);

/// Forex service, ticker catalog and their shared cache, all pointed at one mock upstream
#[allow(dead_code)]
pub struct TestWorker {
    pub upstream: MockServer,
    pub cache: Arc<TtlCache>,
    pub forex: Arc<ForexService>,
    pub catalog: Arc<TickerCatalog>,
}

impl TestWorker {
    pub async fn new() -> Self {
        let upstream = MockServer::start().await;
        let cache = Arc::new(TtlCache::local_only());
        let forex = Arc::new(ForexService::new(
            cache.clone(),
            upstream.uri(),
            upstream.uri(),
            TTL,
        ));
        let catalog = Arc::new(
            TickerCatalog::new(cache.clone(), upstream.uri(), TTL).with_wikipedia_url(upstream.uri()),
        );

        Self {
            upstream,
            cache,
            forex,
            catalog,
        }
    }
}

pub async fn mock_primary_rate(server: &MockServer, rate: f64, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/v6/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "success",
            "base_code": "USD",
            "rates": { "USD": 1.0, "INR": rate }
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mock_primary_error(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v6/latest/USD"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "error",
            "error-type": "quota-reached"
        })))
        .mount(server)
        .await;
}

pub async fn mock_backup_rate(server: &MockServer, rate: f64) {
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("from", "USD"))
        .and(query_param("to", "INR"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "amount": 1.0,
            "base": "USD",
            "rates": { "INR": rate }
        })))
        .mount(server)
        .await;
}

pub async fn mock_coingecko(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/coins/markets"))
        .and(query_param("vs_currency", "inr"))
        .and(query_param("order", "market_cap_desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub fn coingecko_markets() -> serde_json::Value {
    json!([
        {
            "id": "bitcoin",
            "symbol": "btc",
            "name": "Bitcoin",
            "market_cap": 1.2e15,
            "current_price": 5600000.0
        },
        {
            "id": "ethereum",
            "symbol": "eth",
            "name": "Ethereum",
            "market_cap": 3.1e14,
            "current_price": 260000.0
        },
        {
            "id": "pepe",
            "symbol": "pepe",
            "name": "Pepe",
            "market_cap": null,
            "current_price": 0.0009
        }
    ])
}

pub async fn mock_wikipedia_page(server: &MockServer, page: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .and(header("user-agent", "TradeSentient/3.0"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"))
        .mount(server)
        .await;
}

/// S&P 500 page layout: `#constituents` table, symbol then security name
pub fn sp500_html(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(symbol, name)| {
            format!(
                "<tr><td><a href=\"#\">{symbol}</a></td><td><a href=\"#\">{name}</a></td><td>Information Technology</td></tr>"
            )
        })
        .collect();
    format!(
        "<html><body><table class=\"wikitable\" id=\"other\"><tr><th>Date</th></tr><tr><td>X</td><td>Y</td></tr></table>\
         <table class=\"wikitable sortable\" id=\"constituents\"><tbody>\
         <tr><th>Symbol</th><th>Security</th><th>GICS Sector</th></tr>{body}</tbody></table></body></html>"
    )
}

/// NIFTY 50 page layout: an index summary table first, then company name and symbol
pub fn nifty50_html(rows: &[(&str, &str)]) -> String {
    let body: String = rows
        .iter()
        .map(|(name, symbol)| format!("<tr><td>{name}</td><td> {symbol} </td><td>Energy</td></tr>"))
        .collect();
    format!(
        "<html><body><table class=\"wikitable\"><tr><th>Exchange</th><th>Launched</th></tr>\
         <tr><td>NSE</td><td>1996</td></tr></table>\
         <table class=\"wikitable sortable\"><tbody>\
         <tr><th>Company Name</th><th>Symbol</th><th>Sector</th></tr>{body}</tbody></table></body></html>"
    )
}
