//! Unit tests for the outbound event envelope

use serde_json::{json, Value};
use tradesentient::models::{AssetClass, PriceTick, SentimentObservation, ServerEvent};
use tradesentient::services::pubsub::Channel;
use tradesentient::signals::SignalEngine;

fn to_value(event: &ServerEvent) -> Value {
    serde_json::from_str(&event.to_json().unwrap()).unwrap()
}

#[test]
fn test_market_event_shape() {
    let tick = PriceTick::new("BTC", 5_000_000.0)
        .with_asset_class(AssetClass::Crypto)
        .with_exchange("global")
        .with_volume(12.5);
    let event = ServerEvent::market(&tick);
    let value = to_value(&event);

    assert_eq!(value["type"], "market");
    assert_eq!(value["symbol"], "BTC");
    assert_eq!(value["asset_class"], "crypto");
    assert_eq!(value["exchange"], "global");
    assert_eq!(value["currency"], "INR");
    assert_eq!(value["volume"], 12.5);
    assert!(value["timestamp"].is_string());

    assert_eq!(event.symbol(), Some("BTC"));
    assert_eq!(event.channel(), Some(Channel::MarketUpdates));
}

#[test]
fn test_sentiment_event_without_symbol_is_untargeted() {
    let event = ServerEvent::sentiment(&SentimentObservation::new("news", 0.4, "rally"));
    let value = to_value(&event);

    assert_eq!(value["type"], "sentiment");
    assert_eq!(value["score"], 0.4);
    assert_eq!(value["symbol"], Value::Null);
    assert_eq!(event.symbol(), None);
    assert_eq!(event.channel(), Some(Channel::SentimentUpdates));
}

#[test]
fn test_signal_event_shape() {
    let engine = SignalEngine::new(3, 5).unwrap();
    let mut signal = None;
    for price in [10.0, 10.0, 10.0, 10.0, 10.0, 12.0, 8.0, 8.0, 8.0, 20.0] {
        signal = engine.on_price("ETH", price).or(signal);
    }
    let signal = signal.unwrap();

    let value = to_value(&ServerEvent::signal(&signal, Some(AssetClass::Crypto)));
    assert_eq!(value["type"], "signal");
    assert_eq!(value["signal_type"], "BUY");
    assert_eq!(value["symbol"], "ETH");
    assert_eq!(value["short_sma"], 12.0);
    assert_eq!(value["long_sma"], 11.2);
    assert_eq!(value["asset_class"], "crypto");
}

#[test]
fn test_subscribed_replies() {
    let list = to_value(&ServerEvent::subscribed_symbols(vec!["BTC".into(), "ETH".into()]));
    assert_eq!(list, json!({"type": "subscribed", "symbols": ["BTC", "ETH"]}));

    let single = to_value(&ServerEvent::subscribed_symbol("SOL"));
    assert_eq!(single, json!({"type": "subscribed", "symbol": "SOL"}));

    let all = to_value(&ServerEvent::subscribed_all());
    assert_eq!(all, json!({"type": "subscribed", "symbols": "all"}));

    assert_eq!(ServerEvent::subscribed_all().channel(), None);
}
