//! Unit tests for the connection registry

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tradesentient::services::websocket::{
    ConnectionRegistry, DeliveryError, EndpointSink, SubscriptionFilter,
};

/// Sink whose transport is always gone
struct ClosedSink {
    attempts: AtomicUsize,
}

impl EndpointSink for ClosedSink {
    fn try_deliver(&self, _payload: &str) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Closed)
    }
}

fn drain(rx: &mut tokio::sync::mpsc::Receiver<String>) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        out.push(payload);
    }
    out
}

#[test]
fn test_new_endpoint_receives_everything() {
    let registry = ConnectionRegistry::new();
    let (id, mut rx) = registry.register_channel(8);

    assert_eq!(registry.filter(id), Some(SubscriptionFilter::All));
    registry.deliver("a", Some("BTC"));
    registry.deliver("b", None);
    assert_eq!(drain(&mut rx), vec!["a", "b"]);
}

#[test]
fn test_symbol_filters_route_targeted_payloads() {
    let registry = ConnectionRegistry::new();
    let (btc, mut btc_rx) = registry.register_channel(8);
    let (eth, mut eth_rx) = registry.register_channel(8);
    let (_all, mut all_rx) = registry.register_channel(8);

    registry.set_filter(btc, SubscriptionFilter::symbols(["BTC"]));
    registry.set_filter(eth, SubscriptionFilter::symbols(["ETH"]));

    let report = registry.deliver("btc-tick", Some("BTC"));
    assert_eq!(report.delivered, 2);
    assert!(report.evicted.is_empty());

    assert_eq!(drain(&mut btc_rx), vec!["btc-tick"]);
    assert!(drain(&mut eth_rx).is_empty());
    assert_eq!(drain(&mut all_rx), vec!["btc-tick"]);
}

#[test]
fn test_untargeted_payload_reaches_every_filter() {
    let registry = ConnectionRegistry::new();
    let (btc, mut btc_rx) = registry.register_channel(8);
    registry.set_filter(btc, SubscriptionFilter::symbols(["BTC"]));

    let report = registry.deliver("headline", None);
    assert_eq!(report.delivered, 1);
    assert_eq!(drain(&mut btc_rx), vec!["headline"]);
}

#[test]
fn test_empty_symbol_set_only_receives_untargeted() {
    let registry = ConnectionRegistry::new();
    let (id, mut rx) = registry.register_channel(8);
    registry.set_filter(id, SubscriptionFilter::symbols(Vec::<String>::new()));

    registry.deliver("btc", Some("BTC"));
    registry.deliver("news", None);
    assert_eq!(drain(&mut rx), vec!["news"]);
}

#[test]
fn test_add_symbol_replaces_all_filter() {
    let registry = ConnectionRegistry::new();
    let (id, mut rx) = registry.register_channel(8);

    assert!(registry.add_symbol(id, "SOL"));
    assert_eq!(registry.filter(id), Some(SubscriptionFilter::symbols(["SOL"])));

    assert!(registry.add_symbol(id, "ETH"));
    assert_eq!(
        registry.filter(id),
        Some(SubscriptionFilter::symbols(["SOL", "ETH"]))
    );

    registry.deliver("btc", Some("BTC"));
    registry.deliver("eth", Some("ETH"));
    assert_eq!(drain(&mut rx), vec!["eth"]);
}

#[test]
fn test_unregister_is_idempotent() {
    let registry = ConnectionRegistry::new();
    let (id, _rx) = registry.register_channel(8);

    assert!(registry.unregister(id));
    assert!(!registry.unregister(id));
    assert!(registry.is_empty());
    assert!(!registry.add_symbol(id, "BTC"));
    assert!(!registry.set_filter(id, SubscriptionFilter::All));
}

#[test]
fn test_failing_endpoint_is_evicted_without_affecting_others() {
    let registry = ConnectionRegistry::new();
    let (_a, mut a_rx) = registry.register_channel(8);
    let closed = Arc::new(ClosedSink {
        attempts: AtomicUsize::new(0),
    });
    let bad = registry.register(closed.clone());
    let (_c, mut c_rx) = registry.register_channel(8);

    let report = registry.deliver("tick", Some("BTC"));
    assert_eq!(report.delivered, 2);
    assert_eq!(report.evicted, vec![bad]);
    assert!(!registry.contains(bad));
    assert_eq!(registry.len(), 2);

    registry.deliver("tick-2", Some("BTC"));
    assert_eq!(closed.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(drain(&mut a_rx), vec!["tick", "tick-2"]);
    assert_eq!(drain(&mut c_rx), vec!["tick", "tick-2"]);
}

#[test]
fn test_full_queue_evicts_endpoint() {
    let registry = ConnectionRegistry::new();
    let (slow, _slow_rx) = registry.register_channel(1);
    let (_fast, mut fast_rx) = registry.register_channel(8);

    registry.deliver("one", None);
    let report = registry.deliver("two", None);

    assert_eq!(report.evicted, vec![slow]);
    assert_eq!(drain(&mut fast_rx), vec!["one", "two"]);
}

#[test]
fn test_dropped_receiver_is_evicted() {
    let registry = ConnectionRegistry::new();
    let (id, rx) = registry.register_channel(8);
    drop(rx);

    let report = registry.deliver("tick", None);
    assert_eq!(report.delivered, 0);
    assert_eq!(report.evicted, vec![id]);
    assert!(registry.is_empty());
}

#[test]
fn test_send_to_targets_one_endpoint() {
    let registry = ConnectionRegistry::new();
    let (a, mut a_rx) = registry.register_channel(8);
    let (_b, mut b_rx) = registry.register_channel(8);

    registry.send_to(a, "pong").unwrap();
    assert_eq!(drain(&mut a_rx), vec!["pong"]);
    assert!(drain(&mut b_rx).is_empty());

    assert_eq!(
        registry.send_to(999, "pong"),
        Err(DeliveryError::UnknownEndpoint(999))
    );
}

#[test]
fn test_per_endpoint_order_is_preserved() {
    let registry = ConnectionRegistry::new();
    let (_id, mut rx) = registry.register_channel(64);

    for i in 0..20 {
        registry.deliver(&i.to_string(), Some("BTC"));
    }
    let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
    assert_eq!(drain(&mut rx), expected);
}
