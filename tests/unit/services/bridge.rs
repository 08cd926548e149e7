//! Unit tests for the pub/sub bridge

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tradesentient::models::{PriceTick, ServerEvent};
use tradesentient::services::pubsub::{
    Broker, BrokerError, BrokerStream, Channel, InMemoryBroker, PubSubBridge, PublishRoute,
};
use tradesentient::services::websocket::{ConnectionRegistry, SubscriptionFilter};

fn bridge_with(broker: &Arc<InMemoryBroker>) -> (Arc<ConnectionRegistry>, PubSubBridge) {
    let registry = Arc::new(ConnectionRegistry::new());
    let dyn_broker: Arc<dyn Broker> = broker.clone();
    let bridge = PubSubBridge::new(registry.clone(), Some(dyn_broker))
        .with_broker_timeout(Duration::from_millis(200));
    (registry, bridge)
}

/// Answers pings and serves subscriptions, but publishes never complete
struct StalledPublishBroker(InMemoryBroker);

#[async_trait]
impl Broker for StalledPublishBroker {
    async fn ping(&self) -> Result<(), BrokerError> {
        self.0.ping().await
    }

    async fn publish(&self, _channel: Channel, _payload: &str) -> Result<(), BrokerError> {
        std::future::pending().await
    }

    async fn subscribe(&self, channels: &[Channel]) -> Result<BrokerStream, BrokerError> {
        self.0.subscribe(channels).await
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn recv(rx: &mut Receiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for delivery")
        .expect("endpoint queue closed")
}

async fn assert_quiet(rx: &mut Receiver<String>) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err(), "unexpected extra delivery");
}

#[tokio::test]
async fn test_local_only_bridge_delivers_directly() {
    let registry = Arc::new(ConnectionRegistry::new());
    let bridge = PubSubBridge::local_only(registry.clone());
    let (_id, mut rx) = registry.register_channel(8);

    let route = bridge.publish(Channel::MarketUpdates, "payload", Some("BTC")).await;
    match route {
        PublishRoute::Local(report) => assert_eq!(report.delivered, 1),
        other => panic!("expected local delivery, got {:?}", other),
    }
    assert_eq!(recv(&mut rx).await, "payload");
    assert_quiet(&mut rx).await;
}

#[tokio::test]
async fn test_unreachable_broker_falls_back_to_local_exactly_once() {
    let broker = Arc::new(InMemoryBroker::unreachable());
    let (registry, bridge) = bridge_with(&broker);
    bridge.start_listener().await;
    let (_id, mut rx) = registry.register_channel(8);

    let route = bridge.publish(Channel::SignalUpdates, "signal", Some("ETH")).await;
    assert!(matches!(route, PublishRoute::Local(_)));
    assert!(!bridge.is_listening());

    assert_eq!(recv(&mut rx).await, "signal");
    assert_quiet(&mut rx).await;

    bridge.stop().await;
    assert!(!bridge.is_running().await);
}

#[tokio::test]
async fn test_reachable_broker_round_trips_through_listener() {
    let broker = Arc::new(InMemoryBroker::new());
    let (registry, bridge) = bridge_with(&broker);
    let (_id, mut rx) = registry.register_channel(8);

    bridge.start_listener().await;
    wait_until(|| bridge.is_listening()).await;

    let route = bridge.publish(Channel::MarketUpdates, r#"{"symbol":"BTC"}"#, Some("BTC")).await;
    assert_eq!(route, PublishRoute::Broker);

    assert_eq!(recv(&mut rx).await, r#"{"symbol":"BTC"}"#);
    assert_quiet(&mut rx).await;

    bridge.stop().await;
    assert!(!bridge.is_listening());
}

#[tokio::test]
async fn test_inbound_messages_are_targeted_by_symbol() {
    let broker = Arc::new(InMemoryBroker::new());
    let (registry, bridge) = bridge_with(&broker);
    let (btc, mut btc_rx) = registry.register_channel(8);
    let (eth, mut eth_rx) = registry.register_channel(8);
    registry.set_filter(btc, SubscriptionFilter::symbols(["BTC"]));
    registry.set_filter(eth, SubscriptionFilter::symbols(["ETH"]));

    bridge.start_listener().await;
    wait_until(|| bridge.is_listening()).await;

    let event = ServerEvent::market(&PriceTick::new("BTC", 100.0));
    assert_eq!(bridge.publish_event(&event).await, Some(PublishRoute::Broker));

    let delivered: serde_json::Value = serde_json::from_str(&recv(&mut btc_rx).await).unwrap();
    assert_eq!(delivered["symbol"], "BTC");
    assert_quiet(&mut eth_rx).await;

    bridge.stop().await;
}

#[tokio::test]
async fn test_malformed_broker_payload_is_broadcast_untargeted() {
    let broker = Arc::new(InMemoryBroker::new());
    let (registry, bridge) = bridge_with(&broker);
    let (btc, mut btc_rx) = registry.register_channel(8);
    registry.set_filter(btc, SubscriptionFilter::symbols(["BTC"]));

    bridge.start_listener().await;
    wait_until(|| bridge.is_listening()).await;

    // Published by another process straight onto the broker
    broker.publish(Channel::SentimentUpdates, "not json {").await.unwrap();
    broker.publish(Channel::SentimentUpdates, r#"{"type":"sentiment"}"#).await.unwrap();

    assert_eq!(recv(&mut btc_rx).await, "not json {");
    assert_eq!(recv(&mut btc_rx).await, r#"{"type":"sentiment"}"#);

    bridge.stop().await;
}

#[tokio::test]
async fn test_broker_outage_switches_to_local_delivery() {
    let broker = Arc::new(InMemoryBroker::new());
    let (registry, bridge) = bridge_with(&broker);
    let (_id, mut rx) = registry.register_channel(8);

    bridge.start_listener().await;
    wait_until(|| bridge.is_listening()).await;

    broker.set_reachable(false);
    wait_until(|| !bridge.is_listening()).await;

    let route = bridge.publish(Channel::MarketUpdates, "during-outage", None).await;
    assert!(matches!(route, PublishRoute::Local(_)));
    assert_eq!(recv(&mut rx).await, "during-outage");
    assert_quiet(&mut rx).await;

    bridge.stop().await;
}

#[tokio::test]
async fn test_start_listener_without_broker_is_noop() {
    let bridge = PubSubBridge::local_only(Arc::new(ConnectionRegistry::new()));
    bridge.start_listener().await;
    assert!(!bridge.is_running().await);
    bridge.stop().await;
}

#[tokio::test]
async fn test_publish_timeout_is_unconfirmed_and_not_delivered_locally() {
    let registry = Arc::new(ConnectionRegistry::new());
    let broker: Arc<dyn Broker> = Arc::new(StalledPublishBroker(InMemoryBroker::new()));
    let bridge = PubSubBridge::new(registry.clone(), Some(broker))
        .with_broker_timeout(Duration::from_millis(50));
    let (_id, mut rx) = registry.register_channel(8);

    bridge.start_listener().await;
    wait_until(|| bridge.is_listening()).await;

    let route = bridge.publish(Channel::MarketUpdates, "tick", Some("BTC")).await;
    assert_eq!(route, PublishRoute::Unconfirmed);
    assert_quiet(&mut rx).await;

    bridge.stop().await;
}
