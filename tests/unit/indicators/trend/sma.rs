//! Unit tests for SMA indicator

use tradesentient::indicators::trend::{calculate_sma, calculate_sma_pair, check_sma_cross};
use tradesentient::models::Stance;

#[test]
fn test_sma_insufficient_data() {
    assert!(calculate_sma(&[1.0, 2.0], 3).is_none());
    assert!(calculate_sma(&[1.0, 2.0], 0).is_none());
}

#[test]
fn test_sma_uses_trailing_window() {
    let prices = [100.0, 1.0, 2.0, 3.0];
    assert_eq!(calculate_sma(&prices, 3), Some(2.0));
    assert_eq!(calculate_sma(&prices, 4), Some(26.5));
}

#[test]
fn test_sma_pair_requires_long_window() {
    let prices = [1.0, 2.0, 3.0, 4.0];
    assert!(calculate_sma_pair(&prices, 2, 5).is_none());

    let (short, long) = calculate_sma_pair(&prices, 2, 4).unwrap();
    assert_eq!(short, 3.5);
    assert_eq!(long, 2.5);
}

#[test]
fn test_sma_cross_stances() {
    assert_eq!(check_sma_cross(&[1.0, 2.0, 3.0, 4.0], 2, 4), Some(Stance::Bullish));
    assert_eq!(check_sma_cross(&[4.0, 3.0, 2.0, 1.0], 2, 4), Some(Stance::Bearish));
    assert_eq!(check_sma_cross(&[5.0, 5.0, 5.0, 5.0], 2, 4), Some(Stance::Neutral));
    assert_eq!(check_sma_cross(&[5.0, 5.0], 2, 4), None);
}
