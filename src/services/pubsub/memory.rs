//! In-process broker with switchable reachability

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

use super::broker::{Broker, BrokerError, BrokerMessage, BrokerStream, Channel};

const CAPACITY: usize = 1024;

/// Broker living inside the process. Marking it unreachable fails every call
/// and ends all open subscription streams, like a dropped Redis connection.
pub struct InMemoryBroker {
    sender: Mutex<broadcast::Sender<BrokerMessage>>,
    reachable: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(broadcast::channel(CAPACITY).0),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn unreachable() -> Self {
        let broker = Self::new();
        broker.set_reachable(false);
        broker
    }

    pub fn set_reachable(&self, reachable: bool) {
        let was = self.reachable.swap(reachable, Ordering::SeqCst);
        if was && !reachable {
            // Dropping the old sender closes every open subscription.
            *self.sender.lock() = broadcast::channel(CAPACITY).0;
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.lock().receiver_count()
    }

    fn check(&self) -> Result<(), BrokerError> {
        if self.is_reachable() {
            Ok(())
        } else {
            Err(BrokerError::Unavailable("in-memory broker marked unreachable".to_string()))
        }
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn ping(&self) -> Result<(), BrokerError> {
        self.check()
    }

    async fn publish(&self, channel: Channel, payload: &str) -> Result<(), BrokerError> {
        self.check()?;
        // No subscribers is not an error, same as PUBLISH returning 0.
        let _ = self.sender.lock().send(BrokerMessage {
            channel: channel.as_str().to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn subscribe(&self, channels: &[Channel]) -> Result<BrokerStream, BrokerError> {
        self.check()?;
        let wanted: HashSet<&'static str> = channels.iter().map(Channel::as_str).collect();
        let receiver = self.sender.lock().subscribe();

        let stream = futures_util::stream::unfold(
            (receiver, wanted),
            |(mut receiver, wanted)| async move {
                loop {
                    match receiver.recv().await {
                        Ok(message) if wanted.contains(message.channel.as_str()) => {
                            return Some((message, (receiver, wanted)));
                        }
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }
}
