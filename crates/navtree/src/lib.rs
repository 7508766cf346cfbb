//! Navigation tree resolution and caching.
//!
//! This crate provides:
//! - [`Navigator`]: process-level facade owning storage, cache and registrations
//! - [`Resolver`]: per-request menus, breadcrumbs, site maps and current page lookups
//! - [`NavRegistry`] with the [`tree`], [`item`] and [`compose`] builders for
//!   trees declared in code
//! - [`UrlReverser`] and the bundled [`RouteTable`] for pattern URLs
//!
//! # Quick Start
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use navtree::{Navigator, NavigatorConfig, PageContext, Request, RouteTable, User};
//! use navtree_cache::MemoryStore;
//! use navtree_storage::{ItemRecord, MemoryStorage};
//!
//! let storage = Arc::new(MemoryStorage::new());
//! storage.save_tree("main", "Main menu")?;
//! let home = storage.save_item(ItemRecord::new("main", "Home", "/"))?;
//! storage.save_item(ItemRecord::new("main", "About", "/about/").with_parent(home))?;
//!
//! let navigator = Navigator::new(
//!     storage,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(RouteTable::new()),
//!     NavigatorConfig::default(),
//! )?;
//!
//! let ctx = PageContext::new(Request::new("/about/").with_user(User::Anonymous));
//! let mut resolver = navigator.resolver(&ctx);
//!
//! let crumbs = resolver.breadcrumbs("main")?;
//! assert_eq!(crumbs.len(), 2);
//! assert_eq!(resolver.get_current_page_title("main")?, "About");
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod hook;
mod model;
mod navigator;
mod registry;
mod resolver;
mod title;
mod tree_cache;
mod tree_state;
mod url;

pub use context::{PageContext, Request, User};
pub use error::{NavError, PermissionSpecError};
pub use hook::{AccessCheck, ItemsHook};
pub use model::{NavType, TreeItem};
pub use navigator::{Navigator, NavigatorConfig};
pub use registry::{
    DynamicItem, DynamicSource, DynamicTree, NavRegistry, PermissionSpec, compose, item, tree,
};
pub use resolver::Resolver;
pub use title::render_title;
pub use url::{NoRoutes, RouteTable, UrlReverser, iri_to_uri};
