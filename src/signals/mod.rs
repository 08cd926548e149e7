//! SMA crossover signal derivation.

pub mod engine;
pub mod state;

pub use engine::{SignalEngine, HISTORY_SLACK};
pub use state::SymbolState;
