//! Cache store abstraction for navtree.
//!
//! Resolved navigation trees are shared between request handlers (and between
//! processes) through a [`CacheStore`]: a flat key-value store holding opaque
//! bytes with a per-entry expiry. The expiry is a safety net only; entries are
//! normally dropped by explicit deletes when the backing data changes.
//!
//! # Implementations
//!
//! - [`NullStore`]: No-op implementation (always miss)
//! - [`MemoryStore`]: Process-local store shared through `Arc`
//! - [`FileStore`]: File-based store shared across processes, with version validation
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use navtree_cache::{CacheStore, NullStore};
//!
//! let store = NullStore;
//! store.set("navtree", b"{}", Duration::from_secs(60));
//! assert_eq!(store.get("navtree"), None); // NullStore always misses
//! ```

use std::time::Duration;

mod ext;
mod file;
mod memory;

pub use ext::CacheStoreExt;
pub use file::FileStore;
pub use memory::MemoryStore;

/// Default safety-net expiry for cached entries: one year.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

/// Shared key-value store for cached navigation data.
///
/// Implementations must tolerate concurrent readers and writers. No operation
/// reports errors: a failed write simply results in a later miss, which makes
/// the consumer rebuild from the backing store.
pub trait CacheStore: Send + Sync {
    /// Retrieve a cached value.
    ///
    /// Returns `None` on miss or when the entry has expired.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, replacing any existing entry for the same key.
    ///
    /// # Arguments
    ///
    /// * `key` - Cache key (e.g., `"navtree"`)
    /// * `value` - Raw bytes to cache
    /// * `ttl` - Time after which the entry is treated as missing
    fn set(&self, key: &str, value: &[u8], ttl: Duration);

    /// Remove an entry. Removing a missing key is not an error.
    fn delete(&self, key: &str);
}

/// No-op [`CacheStore`] that never stores or retrieves data.
///
/// Use when caching is disabled. Every lookup misses, so every request
/// rebuilds its trees from the backing store.
pub struct NullStore;

impl CacheStore for NullStore {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) {}

    fn delete(&self, _key: &str) {}
}
