//! Services: delivery endpoints, broker bridge, upstream lookups and ingestion

pub mod forex;
pub mod pipeline;
pub mod pubsub;
pub mod tickers;
pub mod websocket;

pub use forex::ForexService;
pub use pipeline::{IngestOutcome, MarketPipeline};
pub use pubsub::{PubSubBridge, PublishRoute};
pub use tickers::{Ticker, TickerCatalog, TickerInfo, TickerSource};
pub use websocket::ConnectionRegistry;

use thiserror::Error;

/// Failure talking to an upstream HTTP API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream rejected the request: {0}")]
    Rejected(String),
    #[error("upstream response is missing {0}")]
    MissingField(&'static str),
    #[error("upstream returned no data")]
    Empty,
    #[error("upstream returned only {0} entries")]
    TooFew(usize),
    #[error("upstream response could not be parsed: {0}")]
    Parse(String),
}
