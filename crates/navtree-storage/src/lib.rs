//! Backing store abstraction for navtree.
//!
//! This crate provides a [`Storage`] trait for reading navigation trees from
//! whatever persists them (a database, a fixture file, memory). This enables:
//!
//! - **Unit testing** of the resolution engine without a database
//! - **Backend flexibility** (SQL, key-value stores, static fixtures)
//! - **Clean separation** between tree resolution logic and persistence
//!
//! # Architecture
//!
//! The crate provides:
//! - [`Storage`] trait with `tree_items()`, `count_trees()` and permission lookups
//! - [`ItemRecord`], [`TreeRecord`] and [`Permission`] rows as stored
//! - [`MemoryStorage`], an in-memory backend that enforces the model invariants
//!   on write and emits [`StorageEvent`]s so caches can invalidate
//! - [`Fixture`], the JSON import/export format
//!
//! # Example
//!
//! ```
//! use navtree_storage::{ItemRecord, MemoryStorage, Storage};
//!
//! let storage = MemoryStorage::new();
//! storage.save_tree("main", "Main menu").unwrap();
//! let home = storage.save_item(ItemRecord::new("main", "Home", "/")).unwrap();
//!
//! let items = storage.tree_items("main").unwrap();
//! assert_eq!(items[0].id, home);
//! assert_eq!(items[0].sort_order, home); // unset sort order defaults to the id
//! ```

mod event;
mod fixture;
mod memory;
mod storage;

pub use event::{Entity, StorageEvent, StorageEventKind, StorageEventReceiver};
pub use fixture::Fixture;
pub use memory::MemoryStorage;
pub use storage::{
    ItemRecord, PermType, Permission, PermissionCatalog, Storage, StorageError,
    StorageErrorKind, TreeRecord,
};
