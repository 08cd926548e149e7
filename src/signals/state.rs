//! Per-symbol rolling price history and last observed stance

use std::collections::VecDeque;

use crate::indicators::trend::calculate_sma_pair;
use crate::models::signal::Stance;

/// Outcome of feeding one price into a [`SymbolState`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossover {
    pub previous: Stance,
    pub current: Stance,
    pub short_average: f64,
    pub long_average: f64,
}

impl Crossover {
    /// Only a departure from a non-neutral stance counts as a crossover
    pub fn is_signal(&self) -> bool {
        self.previous != Stance::Neutral && self.current != self.previous
    }
}

#[derive(Debug, Clone)]
pub struct SymbolState {
    prices: VecDeque<f64>,
    capacity: usize,
    last_stance: Stance,
}

impl SymbolState {
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
            last_stance: Stance::Neutral,
        }
    }

    /// Append a price and re-evaluate the stance.
    ///
    /// Returns `None` while fewer than `long_window` prices have been seen;
    /// the stored stance is left untouched in that case.
    pub fn push(&mut self, price: f64, short_window: usize, long_window: usize) -> Option<Crossover> {
        self.prices.push_back(price);
        while self.prices.len() > self.capacity {
            self.prices.pop_front();
        }

        let (short_average, long_average) =
            calculate_sma_pair(self.prices.make_contiguous(), short_window, long_window)?;

        let current = Stance::from_averages(short_average, long_average);
        let previous = std::mem::replace(&mut self.last_stance, current);

        Some(Crossover {
            previous,
            current,
            short_average,
            long_average,
        })
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn last_stance(&self) -> Stance {
        self.last_stance
    }
}
