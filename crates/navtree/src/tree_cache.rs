//! Structural cache of built trees.
//!
//! All trees live in one composite entry so that a single delete drops every
//! alias at once:
//!
//! ```json
//! {
//!     "trees": {"main": [{"id": 1, "depth": 0, "perms": [], ...}]},
//!     "tree_aliases": {"main_en": true}
//! }
//! ```
//!
//! A separate reset flag asks every process sharing the store to drop the
//! composite on its next access.
//!
//! Saving merges only the entries a resolver rebuilt into the composite as
//! currently stored, so entries read before an invalidation are never
//! written back.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use navtree_cache::{CacheStore, CacheStoreExt};
use serde::{Deserialize, Serialize};

use crate::model::TreeItem;

/// Key of the composite entry.
pub(crate) const CACHE_KEY: &str = "navtree";

/// Key of the cross-process reset flag.
pub(crate) const RESET_KEY: &str = "navtree_reset";

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheEntries {
    /// Built items per resolved alias.
    #[serde(default)]
    trees: HashMap<String, Vec<TreeItem>>,
    /// Whether a tree exists in the backing store, per probed i18n alias.
    #[serde(default)]
    tree_aliases: HashMap<String, bool>,
}

/// Per-request view of the composite cache entry.
///
/// Loaded once when a resolver is created. Rebuilt trees are added with
/// [`set_tree_items`](Self::set_tree_items) and written back with
/// [`save`](Self::save).
pub(crate) struct TreeCache {
    store: Arc<dyn CacheStore>,
    timeout: Duration,
    entries: CacheEntries,
    rebuilt_trees: HashSet<String>,
    probed_aliases: HashSet<String>,
}

impl TreeCache {
    /// Load the composite entry, honoring a pending reset request.
    pub(crate) fn open(store: Arc<dyn CacheStore>, timeout: Duration) -> Self {
        if store.get_flag(RESET_KEY) {
            tracing::info!("Cache reset requested, dropping cached trees");
            Self::clear(store.as_ref());
        }

        let entries = store.get_json::<CacheEntries>(CACHE_KEY).unwrap_or_default();
        tracing::debug!(trees = entries.trees.len(), "Opened tree cache");

        Self {
            store,
            timeout,
            entries,
            rebuilt_trees: HashSet::new(),
            probed_aliases: HashSet::new(),
        }
    }

    /// Drop the composite entry and the reset flag.
    pub(crate) fn clear(store: &dyn CacheStore) {
        store.delete(CACHE_KEY);
        store.delete(RESET_KEY);
    }

    /// Ask every process sharing `store` to drop its cached trees.
    pub(crate) fn request_reset(store: &dyn CacheStore, timeout: Duration) {
        store.set_flag(RESET_KEY, timeout);
    }

    pub(crate) fn tree_items(&self, alias: &str) -> Option<&[TreeItem]> {
        self.entries
            .trees
            .get(alias)
            .map(Vec::as_slice)
            .filter(|items| !items.is_empty())
    }

    pub(crate) fn set_tree_items(&mut self, alias: &str, items: Vec<TreeItem>) {
        self.entries.trees.insert(alias.to_owned(), items);
        self.rebuilt_trees.insert(alias.to_owned());
    }

    pub(crate) fn tree_exists(&self, alias: &str) -> Option<bool> {
        self.entries.tree_aliases.get(alias).copied()
    }

    pub(crate) fn set_tree_exists(&mut self, alias: &str, exists: bool) {
        self.entries.tree_aliases.insert(alias.to_owned(), exists);
        self.probed_aliases.insert(alias.to_owned());
    }

    /// Merge the entries set since opening into the stored composite.
    pub(crate) fn save(&self) {
        let mut stored = self
            .store
            .get_json::<CacheEntries>(CACHE_KEY)
            .unwrap_or_default();
        for alias in &self.rebuilt_trees {
            if let Some(items) = self.entries.trees.get(alias) {
                stored.trees.insert(alias.clone(), items.clone());
            }
        }
        for alias in &self.probed_aliases {
            if let Some(&exists) = self.entries.tree_aliases.get(alias) {
                stored.tree_aliases.insert(alias.clone(), exists);
            }
        }
        self.store.set_json(CACHE_KEY, &stored, self.timeout);
    }
}
