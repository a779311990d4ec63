use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use super::CacheKey;

struct CacheEntry<T> {
    data: T,
    timestamp: Instant,
}

/// In-process key/value cache with a fixed time-to-live
///
/// Expiry is lazy: an entry older than `duration` is dropped by the `get`
/// that discovers it. There is no background sweeping and no size bound;
/// the key space is bounded by the distinct request shapes that reach it.
///
/// Two callers racing on the same missing key will both compute the value
/// and the later `set` wins.
pub struct TtlCache<T> {
    duration: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a clone of the cached value, or `None` if absent or expired
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        let key = key.to_string();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let entry = entries.get(&key)?;
        if entry.timestamp.elapsed() > self.duration {
            entries.remove(&key);
            tracing::debug!(key = %key, "Cache entry expired");
            return None;
        }

        Some(entry.data.clone())
    }

    /// Stores a value, replacing any previous entry and resetting its age
    pub fn set(&self, key: &CacheKey, data: T) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_string(),
            CacheEntry {
                data,
                timestamp: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of stored entries, including expired ones not yet read
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
