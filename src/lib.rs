//! Real-time market event distribution: SMA crossover signals, subscription
//! filtered fan-out to WebSocket endpoints, a broker bridge with local
//! fallback and a two-tier TTL cache.

pub mod cache;
pub mod config;
pub mod core;
pub mod indicators;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod signals;
