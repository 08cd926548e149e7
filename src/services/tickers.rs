//! Ticker catalog per asset class
//!
//! Crypto tickers are pulled live from CoinGecko (top coins by market cap,
//! priced in INR). US and Indian stocks come from the S&P 500 and NIFTY 50
//! constituent tables on Wikipedia. Any failed or too-short fetch falls back
//! to a seeded list. Every list is cached under `tickers:<asset_class>` so
//! request handlers and the refresh worker share the same view.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::FetchError;
use crate::cache::TtlCache;
use crate::config::{Settings, DEFAULT_WIKIPEDIA_URL};
use crate::models::market::AssetClass;

pub const DEFAULT_TICKER_LIMIT: usize = 50;

/// A scraped constituent table shorter than this is treated as broken
pub const MIN_SCRAPED_TICKERS: usize = 10;

pub const SP500_PAGE: &str = "/List_of_S%26P_500_companies";
pub const NIFTY50_PAGE: &str = "/NIFTY_50";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = "TradeSentient/3.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl Ticker {
    fn seeded(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            coingecko_id: None,
            market_cap: None,
            current_price: None,
        }
    }

    fn seeded_coin(symbol: &str, name: &str, coingecko_id: &str) -> Self {
        Self {
            coingecko_id: Some(coingecko_id.to_string()),
            ..Self::seeded(symbol, name)
        }
    }
}

/// Where a ticker list came from
#[derive(Debug, Clone, PartialEq)]
pub enum TickerSource {
    Live(Vec<Ticker>),
    Seeded(Vec<Ticker>),
}

impl TickerSource {
    pub fn is_live(&self) -> bool {
        matches!(self, TickerSource::Live(_))
    }

    pub fn tickers(&self) -> &[Ticker] {
        match self {
            TickerSource::Live(tickers) | TickerSource::Seeded(tickers) => tickers,
        }
    }

    pub fn into_tickers(self) -> Vec<Ticker> {
        match self {
            TickerSource::Live(tickers) | TickerSource::Seeded(tickers) => tickers,
        }
    }
}

/// Full metadata for one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerInfo {
    pub symbol: String,
    pub name: String,
    pub asset_class: AssetClass,
    pub exchange: &'static str,
    pub currency: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coingecko_id: Option<String>,
}

pub fn seed_tickers(asset_class: AssetClass) -> Vec<Ticker> {
    match asset_class {
        AssetClass::Crypto => [
            ("BTC", "Bitcoin", "bitcoin"),
            ("ETH", "Ethereum", "ethereum"),
            ("BNB", "BNB", "binancecoin"),
            ("SOL", "Solana", "solana"),
            ("XRP", "Ripple", "ripple"),
            ("ADA", "Cardano", "cardano"),
            ("DOGE", "Dogecoin", "dogecoin"),
            ("AVAX", "Avalanche", "avalanche-2"),
            ("DOT", "Polkadot", "polkadot"),
            ("MATIC", "Polygon", "matic-network"),
        ]
        .iter()
        .map(|(symbol, name, id)| Ticker::seeded_coin(symbol, name, id))
        .collect(),
        AssetClass::UsStock => [
            ("AAPL", "Apple Inc."),
            ("MSFT", "Microsoft Corp."),
            ("GOOGL", "Alphabet Inc."),
            ("AMZN", "Amazon.com Inc."),
            ("NVDA", "NVIDIA Corp."),
            ("META", "Meta Platforms Inc."),
            ("TSLA", "Tesla Inc."),
            ("BRK-B", "Berkshire Hathaway"),
            ("JPM", "JPMorgan Chase"),
            ("V", "Visa Inc."),
        ]
        .iter()
        .map(|(symbol, name)| Ticker::seeded(symbol, name))
        .collect(),
        AssetClass::InStock => [
            ("RELIANCE", "Reliance Industries"),
            ("TCS", "Tata Consultancy Services"),
            ("HDFCBANK", "HDFC Bank"),
            ("INFY", "Infosys"),
            ("ICICIBANK", "ICICI Bank"),
            ("HINDUNILVR", "Hindustan Unilever"),
            ("ITC", "ITC Limited"),
            ("SBIN", "State Bank of India"),
            ("BHARTIARTL", "Bharti Airtel"),
            ("KOTAKBANK", "Kotak Mahindra Bank"),
        ]
        .iter()
        .map(|(symbol, name)| Ticker::seeded(symbol, name))
        .collect(),
    }
}

#[derive(Debug, Deserialize)]
struct CoinMarket {
    id: String,
    symbol: String,
    name: String,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    current_price: Option<f64>,
}

impl From<CoinMarket> for Ticker {
    fn from(coin: CoinMarket) -> Self {
        Self {
            symbol: coin.symbol.to_uppercase(),
            name: coin.name,
            coingecko_id: Some(coin.id),
            market_cap: coin.market_cap,
            current_price: coin.current_price,
        }
    }
}

pub struct TickerCatalog {
    client: reqwest::Client,
    cache: Arc<TtlCache>,
    coingecko_url: String,
    wikipedia_url: String,
    ttl: Duration,
    limit: usize,
}

impl TickerCatalog {
    pub fn new(cache: Arc<TtlCache>, coingecko_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            cache,
            coingecko_url: coingecko_url.into(),
            wikipedia_url: DEFAULT_WIKIPEDIA_URL.to_string(),
            ttl,
            limit: DEFAULT_TICKER_LIMIT,
        }
    }

    pub fn from_settings(settings: &Settings, cache: Arc<TtlCache>) -> Self {
        Self::new(cache, settings.coingecko_api_url.clone(), settings.cache_ttl)
            .with_wikipedia_url(settings.wikipedia_url.clone())
    }

    /// Base URL the constituent pages are resolved against
    pub fn with_wikipedia_url(mut self, url: impl Into<String>) -> Self {
        self.wikipedia_url = url.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Cached ticker list for a class, fetched and cached on a miss
    pub async fn tickers(&self, asset_class: AssetClass) -> Vec<Ticker> {
        let key = asset_class.cache_key();
        if let Some(cached) = self.cache.get_json::<Vec<Ticker>>(&key).await {
            if !cached.is_empty() {
                return cached;
            }
        }

        let tickers = self.fetch(asset_class).await.into_tickers();
        self.store(asset_class, &tickers).await;
        tickers
    }

    /// Re-fetch every class and overwrite the cache. Returns the count per class.
    pub async fn refresh_all(&self) -> Vec<(AssetClass, usize)> {
        let mut counts = Vec::with_capacity(AssetClass::ALL.len());
        for asset_class in AssetClass::ALL {
            let source = self.fetch(asset_class).await;
            let live = source.is_live();
            let tickers = source.into_tickers();
            self.store(asset_class, &tickers).await;

            info!(
                asset_class = %asset_class,
                count = tickers.len(),
                live = live,
                "TickerCatalog: cached {} {} tickers",
                tickers.len(),
                asset_class
            );
            counts.push((asset_class, tickers.len()));
        }
        counts
    }

    /// Fetch a class from its upstream source, falling back to the seeded list
    pub async fn fetch(&self, asset_class: AssetClass) -> TickerSource {
        match asset_class {
            AssetClass::Crypto => match self.fetch_top_crypto().await {
                Ok(tickers) => TickerSource::Live(tickers),
                Err(e) => {
                    warn!(error = %e, "TickerCatalog: CoinGecko fetch failed, using seeded crypto list");
                    TickerSource::Seeded(seed_tickers(asset_class))
                }
            },
            AssetClass::UsStock | AssetClass::InStock => {
                match self.fetch_constituents(asset_class).await {
                    Ok(tickers) => TickerSource::Live(tickers),
                    Err(e) => {
                        warn!(asset_class = %asset_class, error = %e, "TickerCatalog: Wikipedia fetch failed, using seeded {} list", asset_class);
                        TickerSource::Seeded(seed_tickers(asset_class))
                    }
                }
            }
        }
    }

    pub async fn all_symbols(&self, asset_class: Option<AssetClass>) -> Vec<String> {
        let classes: Vec<AssetClass> = match asset_class {
            Some(asset_class) => vec![asset_class],
            None => AssetClass::ALL.to_vec(),
        };

        let mut symbols = Vec::new();
        for asset_class in classes {
            symbols.extend(self.tickers(asset_class).await.into_iter().map(|t| t.symbol));
        }
        symbols
    }

    /// First asset class whose list contains `symbol`
    pub async fn asset_class_of(&self, symbol: &str) -> Option<AssetClass> {
        for asset_class in AssetClass::ALL {
            if self.tickers(asset_class).await.iter().any(|t| t.symbol == symbol) {
                return Some(asset_class);
            }
        }
        None
    }

    pub async fn ticker_info(&self, symbol: &str) -> Option<TickerInfo> {
        for asset_class in AssetClass::ALL {
            let found = self
                .tickers(asset_class)
                .await
                .into_iter()
                .find(|t| t.symbol == symbol);

            if let Some(ticker) = found {
                return Some(TickerInfo {
                    symbol: ticker.symbol,
                    name: ticker.name,
                    asset_class,
                    exchange: asset_class.exchange(),
                    currency: "INR",
                    coingecko_id: ticker.coingecko_id,
                });
            }
        }
        None
    }

    /// `symbol → coingecko id` for every cached crypto ticker
    pub async fn coingecko_ids(&self) -> HashMap<String, String> {
        self.tickers(AssetClass::Crypto)
            .await
            .into_iter()
            .filter_map(|t| t.coingecko_id.map(|id| (t.symbol, id)))
            .collect()
    }

    async fn store(&self, asset_class: AssetClass, tickers: &[Ticker]) {
        if let Err(e) = self
            .cache
            .set_json(&asset_class.cache_key(), &tickers, self.ttl)
            .await
        {
            warn!(asset_class = %asset_class, error = %e, "TickerCatalog: failed to cache ticker list");
        }
    }

    async fn fetch_top_crypto(&self) -> Result<Vec<Ticker>, FetchError> {
        let url = format!("{}/coins/markets", self.coingecko_url.trim_end_matches('/'));
        let per_page = self.limit.to_string();
        debug!(limit = self.limit, "TickerCatalog: fetching top {} crypto from CoinGecko", self.limit);

        let coins: Vec<CoinMarket> = self
            .client
            .get(&url)
            .query(&[
                ("vs_currency", "inr"),
                ("order", "market_cap_desc"),
                ("per_page", per_page.as_str()),
                ("page", "1"),
                ("sparkline", "false"),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if coins.is_empty() {
            return Err(FetchError::Empty);
        }
        Ok(coins.into_iter().map(Ticker::from).collect())
    }

    async fn fetch_constituents(&self, asset_class: AssetClass) -> Result<Vec<Ticker>, FetchError> {
        let page = match asset_class {
            AssetClass::InStock => NIFTY50_PAGE,
            _ => SP500_PAGE,
        };
        let url = format!("{}{}", self.wikipedia_url.trim_end_matches('/'), page);
        debug!(asset_class = %asset_class, url = %url, "TickerCatalog: fetching constituents");

        let html = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let tickers = match asset_class {
            AssetClass::InStock => parse_nifty50(&html, self.limit)?,
            _ => parse_sp500(&html, self.limit)?,
        };

        if tickers.len() < MIN_SCRAPED_TICKERS {
            return Err(FetchError::TooFew(tickers.len()));
        }
        Ok(tickers)
    }
}

fn selector(css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Text of an element with each text node trimmed, joined without separators
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().map(str::trim).collect()
}

/// Rows of the `#constituents` table: symbol in column 1, name in column 2.
/// Dotted share classes use hyphens (`BRK.B` → `BRK-B`).
pub fn parse_sp500(html: &str, limit: usize) -> Result<Vec<Ticker>, FetchError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table#constituents")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Err(FetchError::MissingField("constituents table"));
    };

    let tickers = table
        .select(&row_sel)
        .skip(1)
        .take(limit)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
            match cells.as_slice() {
                [symbol, name, ..] => Some(Ticker::seeded(&symbol.replace('.', "-"), name)),
                _ => None,
            }
        })
        .collect();
    Ok(tickers)
}

/// First `wikitable` whose headers mention a symbol, ticker or company column.
/// Company name in column 1, symbol in column 2 with exchange suffixes removed.
pub fn parse_nifty50(html: &str, limit: usize) -> Result<Vec<Ticker>, FetchError> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.wikitable")?;
    let header_sel = selector("th")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    for table in document.select(&table_sel) {
        let is_constituents = table.select(&header_sel).any(|th| {
            let header = cell_text(th).to_lowercase();
            header.contains("symbol") || header.contains("ticker") || header.contains("company")
        });
        if !is_constituents {
            continue;
        }

        let tickers: Vec<Ticker> = table
            .select(&row_sel)
            .skip(1)
            .take(limit)
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
                let [name, symbol, ..] = cells.as_slice() else {
                    return None;
                };
                let symbol = symbol.replace(".NS", "").replace(".BO", "");
                let symbol = symbol.trim();
                (!symbol.is_empty() && !name.is_empty()).then(|| Ticker::seeded(symbol, name))
            })
            .collect();

        if !tickers.is_empty() {
            return Ok(tickers);
        }
    }
    Ok(Vec::new())
}
