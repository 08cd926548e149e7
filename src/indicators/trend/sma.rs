//! SMA (Simple Moving Average) indicator

use crate::models::signal::Stance;

/// Arithmetic mean of the last `window` prices
pub fn calculate_sma(prices: &[f64], window: usize) -> Option<f64> {
    if window == 0 || prices.len() < window {
        return None;
    }

    let tail = &prices[prices.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// Short and long SMAs over the same series
pub fn calculate_sma_pair(prices: &[f64], short_window: usize, long_window: usize) -> Option<(f64, f64)> {
    let short = calculate_sma(prices, short_window)?;
    let long = calculate_sma(prices, long_window)?;
    Some((short, long))
}

/// Stance of the short SMA relative to the long SMA (unrounded comparison)
pub fn check_sma_cross(prices: &[f64], short_window: usize, long_window: usize) -> Option<Stance> {
    let (short, long) = calculate_sma_pair(prices, short_window, long_window)?;
    Some(Stance::from_averages(short, long))
}
