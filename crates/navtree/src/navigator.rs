//! Process-level entry point.
//!
//! A [`Navigator`] owns everything that outlives a request: the backing
//! store, the shared cache store, the registry of dynamic trees and hooks, the
//! URL reverser and the configuration. Requests are served by short-lived
//! [`Resolver`]s obtained from [`Navigator::resolver`].
//!
//! # Thread Safety
//!
//! `Navigator` is `Send + Sync` and meant to be shared through `Arc`:
//! - `resolver()` takes a snapshot of the registry (an `Arc` clone)
//! - registrations replace the registry copy-on-write, so resolvers already
//!   running keep the snapshot they started with
//! - storage change events are drained under a mutex before each request
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use navtree::{Navigator, NavigatorConfig, PageContext, Request, RouteTable};
//! use navtree_cache::MemoryStore;
//! use navtree_storage::{ItemRecord, MemoryStorage};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! storage.save_tree("main", "Main").unwrap();
//! storage.save_item(ItemRecord::new("main", "Home", "/")).unwrap();
//!
//! let navigator = Navigator::new(
//!     storage,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(RouteTable::new()),
//!     NavigatorConfig::default(),
//! )
//! .unwrap();
//!
//! let ctx = PageContext::new(Request::new("/"));
//! let menu = navigator.resolver(&ctx).menu("main", "trunk").unwrap();
//! assert!(menu[0].is_current);
//! ```

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use navtree_cache::{CacheStore, DEFAULT_TIMEOUT};
use navtree_storage::{Storage, StorageEventReceiver};

use crate::context::{PageContext, Request};
use crate::error::NavError;
use crate::hook::{AccessCheck, ItemsHook};
use crate::registry::{DynamicSource, NavRegistry};
use crate::resolver::Resolver;
use crate::tree_cache::TreeCache;
use crate::url::UrlReverser;

/// Resolution settings.
#[derive(Clone, Debug)]
pub struct NavigatorConfig {
    /// Safety-net expiry of cache entries.
    pub cache_timeout: Duration,
    /// URL given to pattern items that cannot be reversed.
    pub unresolved_marker: String,
    /// Debug mode.
    pub debug: bool,
    /// In debug mode, fail when the current item cannot be resolved.
    pub raise_items_errors_on_debug: bool,
    /// Build trees from registered dynamic trees only, never querying the store.
    pub dynamic_only: bool,
    /// `current_app` value that switches on admin rendering.
    pub admin_app_name: String,
    /// Value of the root entry in [`Navigator::item_choices`].
    pub items_field_root_id: String,
    /// Label of the root entry in [`Navigator::item_choices`].
    pub root_title: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            cache_timeout: DEFAULT_TIMEOUT,
            unresolved_marker: "#unresolved".to_owned(),
            debug: false,
            raise_items_errors_on_debug: true,
            dynamic_only: false,
            admin_app_name: "admin".to_owned(),
            items_field_root_id: String::new(),
            root_title: "---------".to_owned(),
        }
    }
}

impl NavigatorConfig {
    /// Whether an unresolved current item is an error.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.debug && self.raise_items_errors_on_debug
    }
}

/// Shared navigation engine.
pub struct Navigator {
    storage: Arc<dyn Storage>,
    cache_store: Arc<dyn CacheStore>,
    registry: RwLock<Arc<NavRegistry>>,
    reverser: Arc<dyn UrlReverser>,
    config: NavigatorConfig,
    events: Mutex<StorageEventReceiver>,
}

impl Navigator {
    /// Create a navigator and subscribe to storage changes.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Storage`] if the storage cannot be watched.
    pub fn new(
        storage: Arc<dyn Storage>,
        cache_store: Arc<dyn CacheStore>,
        reverser: Arc<dyn UrlReverser>,
        config: NavigatorConfig,
    ) -> Result<Self, NavError> {
        let events = storage.watch()?;
        Ok(Self {
            storage,
            cache_store,
            registry: RwLock::new(Arc::new(NavRegistry::new())),
            reverser,
            config,
            events: Mutex::new(events),
        })
    }

    #[must_use]
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Current registry snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn registry(&self) -> Arc<NavRegistry> {
        Arc::clone(&self.registry.read().unwrap())
    }

    /// Create a resolver for one page render.
    ///
    /// Pending storage changes are applied first: any write since the last
    /// call drops the cached trees.
    ///
    /// # Panics
    ///
    /// Panics if an internal lock is poisoned.
    pub fn resolver<'a>(&'a self, ctx: &'a PageContext) -> Resolver<'a> {
        let events = self.events.lock().unwrap().drain();
        if !events.is_empty() {
            tracing::info!(events = events.len(), "Storage changed, invalidating cached trees");
            self.invalidate();
        }

        let cache = TreeCache::open(Arc::clone(&self.cache_store), self.config.cache_timeout);
        Resolver::new(
            self.storage.as_ref(),
            self.reverser.as_ref(),
            &self.config,
            ctx,
            self.registry(),
            cache,
        )
    }

    /// Drop every cached tree in this process's cache store.
    pub fn invalidate(&self) {
        TreeCache::clear(self.cache_store.as_ref());
    }

    /// Drop cached trees and ask every process sharing the cache store to do
    /// the same on its next access.
    pub fn reset(&self) {
        tracing::info!("Resetting tree cache");
        TreeCache::clear(self.cache_store.as_ref());
        TreeCache::request_reset(self.cache_store.as_ref(), self.config.cache_timeout);
    }

    fn update_registry(&self, update: impl FnOnce(&mut NavRegistry)) {
        let mut registry = self.registry.write().unwrap();
        update(Arc::make_mut(&mut registry));
    }

    /// Register dynamic trees.
    ///
    /// With `reset_cache`, cached trees are dropped in every process so the
    /// new trees show up right away.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register_dynamic_trees(
        &self,
        sources: impl IntoIterator<Item = DynamicSource>,
        reset_cache: bool,
    ) {
        self.update_registry(|registry| registry.register_dynamic_trees(sources));
        if reset_cache {
            self.reset();
        }
    }

    /// Declare trees with per-language variants.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register_i18n_trees<I, S>(&self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.update_registry(|registry| registry.register_i18n_trees(aliases));
    }

    /// Install the items hook.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register_items_hook(&self, hook: impl ItemsHook + 'static) {
        self.update_registry(|registry| registry.register_items_hook(hook));
    }

    /// Register a named access check.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn register_access_check(
        &self,
        name: impl Into<String>,
        check: impl AccessCheck + 'static,
    ) {
        self.update_registry(|registry| registry.register_access_check(name, check));
    }

    /// Flat, indented list of a tree's items for a parent selector.
    ///
    /// The first entry is the root choice. Every item follows in depth-first
    /// order as `(id, "|--- " * depth + title)`. Hidden and restricted items
    /// are included; i18n variants are not substituted.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Storage`] if the tree cannot be loaded.
    pub fn item_choices(&self, alias: &str) -> Result<Vec<(String, String)>, NavError> {
        let ctx = PageContext::new(Request::new("").with_current_app(&self.config.admin_app_name));
        self.resolver(&ctx).item_choices(alias)
    }
}
