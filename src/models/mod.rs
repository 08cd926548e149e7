//! Shared data models spanning the pipeline layers.

pub mod events;
pub mod market;
pub mod signal;

pub use events::{AllSymbols, ServerEvent, SubscribedSymbols};
pub use market::{AssetClass, PriceTick, SentimentObservation};
pub use signal::{round2, SignalEvent, SignalType, Stance};
