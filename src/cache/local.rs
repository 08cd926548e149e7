//! Process-local cache tier with lazy expiry

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::clock::Clock;

#[derive(Debug, Clone)]
struct LocalEntry {
    value: String,
    expires_at: Instant,
}

/// In-memory tier. Expired entries read as absent and are dropped on access;
/// nothing is evicted on a timer.
pub struct LocalTier {
    entries: Mutex<HashMap<String, LocalEntry>>,
    clock: Arc<dyn Clock>,
}

impl LocalTier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.lock().insert(
            key.to_string(),
            LocalEntry {
                value: value.to_string(),
                expires_at,
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Number of stored entries, including expired ones not yet touched
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
