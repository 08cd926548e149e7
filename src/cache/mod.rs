//! Two-tier time-to-live cache (shared Redis tier + process-local tier).

pub mod clock;
pub mod local;
pub mod redis;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use local::LocalTier;
pub use redis::RedisCache;
pub use ttl::{SharedTier, TtlCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("shared cache unavailable: {0}")]
    Unavailable(String),
    #[error("shared cache operation timed out")]
    Timeout,
    #[error("cache value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}
