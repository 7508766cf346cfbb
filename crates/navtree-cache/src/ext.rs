//! Extension trait for [`CacheStore`] with typed convenience methods.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::CacheStore;

/// Typed convenience methods for [`CacheStore`].
///
/// Provides `get_json`/`set_json` for serde-serializable types and
/// `get_flag`/`set_flag` for boolean markers such as the cross-process
/// reset request. Implemented as default methods on an extension trait so
/// that [`CacheStore`] stays object-safe and implementors only handle bytes.
///
/// # Example
///
/// ```
/// use navtree_cache::{CacheStoreExt, MemoryStore, DEFAULT_TIMEOUT};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Entry { alias: String }
///
/// let store = MemoryStore::new();
/// store.set_json("entry", &Entry { alias: "main".into() }, DEFAULT_TIMEOUT);
/// let entry: Option<Entry> = store.get_json("entry");
/// assert_eq!(entry.unwrap().alias, "main");
/// ```
pub trait CacheStoreExt: CacheStore {
    /// Retrieve a JSON-deserialized value.
    ///
    /// Returns `None` on miss or deserialization failure.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Store a value as JSON.
    ///
    /// Silently does nothing if serialization fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.set(key, &bytes, ttl),
            Err(e) => tracing::debug!(key, error = %e, "Failed to serialize cache entry"),
        }
    }

    /// Read a boolean flag. Missing entries read as `false`.
    fn get_flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|bytes| bytes.as_slice() == b"1")
    }

    /// Raise a boolean flag.
    fn set_flag(&self, key: &str, ttl: Duration) {
        self.set(key, b"1", ttl);
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, NullStore};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        depth: usize,
    }

    #[test]
    fn test_json_roundtrip_through_memory_store() {
        let store = MemoryStore::new();
        let sample = Sample {
            name: "main".to_owned(),
            depth: 2,
        };

        store.set_json("sample", &sample, Duration::from_secs(60));

        assert_eq!(store.get_json::<Sample>("sample"), Some(sample));
    }

    #[test]
    fn test_get_json_invalid_payload_returns_none() {
        let store = MemoryStore::new();
        store.set("sample", b"not json", Duration::from_secs(60));

        assert_eq!(store.get_json::<Sample>("sample"), None);
    }

    #[test]
    fn test_flag_defaults_to_false() {
        let store = MemoryStore::new();
        assert!(!store.get_flag("reset"));
    }

    #[test]
    fn test_flag_set_and_delete() {
        let store = MemoryStore::new();

        store.set_flag("reset", Duration::from_secs(60));
        assert!(store.get_flag("reset"));

        store.delete("reset");
        assert!(!store.get_flag("reset"));
    }

    #[test]
    fn test_ext_works_on_trait_objects() {
        let store: Box<dyn CacheStore> = Box::new(NullStore);
        store.set_flag("reset", Duration::from_secs(60));
        assert!(!store.get_flag("reset"));
    }
}
