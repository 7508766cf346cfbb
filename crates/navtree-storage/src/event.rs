//! Storage event types for change notification.
//!
//! Provides types for subscribing to storage writes through the
//! [`Storage::watch`](crate::Storage::watch) method.

use std::sync::mpsc;

/// Kind of storage event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageEventKind {
    /// Row was created.
    Created,
    /// Row was modified.
    Modified,
    /// Row was removed.
    Removed,
}

/// What kind of row changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    /// A tree.
    Tree,
    /// A tree item.
    Item,
    /// The permission set attached to an item.
    ItemPermissions,
    /// A permission in the catalog.
    Permission,
}

/// A storage change event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    /// Kind of row that changed.
    pub entity: Entity,
    /// Kind of change.
    pub kind: StorageEventKind,
    /// Alias of the affected tree, if the row belongs to one.
    pub tree: Option<String>,
}

/// Receiver for storage events.
///
/// Wraps a [`std::sync::mpsc::Receiver`] for synchronous event delivery.
/// Consumers usually poll it with [`drain()`](Self::drain) before serving a
/// request rather than blocking on it.
pub struct StorageEventReceiver {
    rx: mpsc::Receiver<StorageEvent>,
}

impl StorageEventReceiver {
    /// Create a new receiver from a channel receiver.
    pub(crate) fn new(rx: mpsc::Receiver<StorageEvent>) -> Self {
        Self { rx }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is available or the sender is dropped.
    #[must_use]
    pub fn try_recv(&self) -> Option<StorageEvent> {
        self.rx.try_recv().ok()
    }

    /// Collect every event that is currently queued, without blocking.
    #[must_use]
    pub fn drain(&self) -> Vec<StorageEvent> {
        self.rx.try_iter().collect()
    }

    /// Create a no-op receiver that never yields events.
    ///
    /// Used by the default `Storage::watch()` implementation for backends
    /// that don't support change notification.
    pub(crate) fn no_op() -> Self {
        let (_tx, rx) = mpsc::channel();
        Self { rx }
    }
}
