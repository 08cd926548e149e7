//! Real-time SMA crossover engine.
//!
//! Keeps a bounded price window per symbol and emits BUY/SELL events when the
//! short SMA crosses the long SMA. Ticks for one symbol are serialized behind
//! that symbol's lock; different symbols proceed in parallel.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::state::{Crossover, SymbolState};
use crate::config::ConfigError;
use crate::models::signal::{round2, SignalEvent, SignalType, Stance};

/// Extra history kept beyond the long window
pub const HISTORY_SLACK: usize = 5;

pub struct SignalEngine {
    short_window: usize,
    long_window: usize,
    states: RwLock<HashMap<String, Arc<Mutex<SymbolState>>>>,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self {
            short_window: 10,
            long_window: 30,
            states: RwLock::new(HashMap::new()),
        }
    }
}

impl SignalEngine {
    pub fn new(short_window: usize, long_window: usize) -> Result<Self, ConfigError> {
        if short_window == 0 || short_window >= long_window {
            return Err(ConfigError::InvalidWindows {
                short: short_window,
                long: long_window,
            });
        }

        Ok(Self {
            short_window,
            long_window,
            states: RwLock::new(HashMap::new()),
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }

    /// Feed a new price tick. Returns a signal if a crossover occurred.
    pub fn on_price(&self, symbol: &str, price: f64) -> Option<SignalEvent> {
        let state = self.state_for(symbol);
        let crossover = {
            let mut state = state.lock();
            state.push(price, self.short_window, self.long_window)
        };

        let Some(crossover) = crossover else {
            debug!(symbol = %symbol, "SignalEngine: not enough history for {}", symbol);
            return None;
        };

        if !crossover.is_signal() {
            return None;
        }

        let signal = self.build_signal(symbol, price, &crossover);
        info!(
            symbol = %symbol,
            signal_type = %signal.signal_type,
            short_sma = signal.short_average,
            long_sma = signal.long_average,
            "SignalEngine: {}",
            signal.details
        );
        Some(signal)
    }

    fn build_signal(&self, symbol: &str, price: f64, crossover: &Crossover) -> SignalEvent {
        let bullish = crossover.current == Stance::Bullish;
        let signal_type = if bullish { SignalType::Buy } else { SignalType::Sell };
        let direction = if bullish { "above" } else { "below" };

        SignalEvent {
            signal_type,
            symbol: symbol.to_string(),
            price: round2(price),
            short_average: round2(crossover.short_average),
            long_average: round2(crossover.long_average),
            details: format!(
                "{} - SMA{} ({:.2}) crossed {} SMA{} ({:.2})",
                signal_type,
                self.short_window,
                crossover.short_average,
                direction,
                self.long_window,
                crossover.long_average
            ),
            timestamp: Utc::now(),
        }
    }

    fn state_for(&self, symbol: &str) -> Arc<Mutex<SymbolState>> {
        if let Some(state) = self.states.read().get(symbol) {
            return state.clone();
        }

        let capacity = self.long_window + HISTORY_SLACK;
        self.states
            .write()
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SymbolState::new(capacity))))
            .clone()
    }

    /// Number of prices currently retained for `symbol`
    pub fn history_len(&self, symbol: &str) -> usize {
        self.states
            .read()
            .get(symbol)
            .map(|s| s.lock().len())
            .unwrap_or(0)
    }

    pub fn stance(&self, symbol: &str) -> Option<Stance> {
        self.states.read().get(symbol).map(|s| s.lock().last_stance())
    }

    pub fn symbols(&self) -> Vec<String> {
        self.states.read().keys().cloned().collect()
    }
}
