//! In-process cache store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::CacheStore;

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

/// Process-local [`CacheStore`] backed by a `HashMap`.
///
/// Share one instance between request handlers through `Arc`. Expired entries
/// are evicted lazily on read.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (possibly expired but not yet evicted) entries.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        let expired = entries
            .get(key)?
            .expires_at
            .is_some_and(|at| at <= Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) {
        // An overflowing deadline means "never expires"
        let expires_at = Instant::now().checked_add(ttl);
        self.entries.lock().unwrap().insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
    }

    fn delete(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}
