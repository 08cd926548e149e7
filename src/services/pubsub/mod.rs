//! Publish/subscribe bridge between local endpoints and an external broker.

pub mod bridge;
pub mod broker;
pub mod memory;
pub mod redis;

pub use bridge::{PubSubBridge, PublishRoute};
pub use broker::{Broker, BrokerError, BrokerMessage, BrokerStream, Channel};
pub use memory::InMemoryBroker;
pub use redis::RedisBroker;
