//! In-memory storage backend.
//!
//! [`MemoryStorage`] is the reference backend: it enforces the tree model
//! invariants on every write and reports writes to watchers, which is what the
//! resolution engine uses to invalidate its cache.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, RwLock, mpsc};

use crate::event::{Entity, StorageEvent, StorageEventKind, StorageEventReceiver};
use crate::fixture::Fixture;
use crate::storage::{
    ItemRecord, Permission, PermissionCatalog, Storage, StorageError, TreeRecord,
};

const BACKEND: &str = "Memory";

#[derive(Clone, Debug, Default)]
struct State {
    trees: BTreeMap<String, TreeRecord>,
    items: BTreeMap<i64, ItemRecord>,
    permissions: BTreeMap<i64, Permission>,
    last_tree_id: i64,
    last_item_id: i64,
    last_permission_id: i64,
}

fn next_id(last: &mut i64) -> i64 {
    *last += 1;
    *last
}

/// Blank aliases are stored as `None` so that uniqueness only applies to real aliases.
fn normalize_alias(alias: Option<String>) -> Option<String> {
    alias.filter(|a| !a.trim().is_empty())
}

impl State {
    fn tree_exists(&self, alias: &str) -> bool {
        self.trees.contains_key(alias)
    }

    fn resolve_permission(&self, perm: &Permission) -> Result<Permission, StorageError> {
        if let Some(found) = self.permissions.get(&perm.id) {
            return Ok(found.clone());
        }
        self.permissions
            .values()
            .find(|p| p.app_label == perm.app_label && p.codename == perm.codename)
            .cloned()
            .ok_or_else(|| {
                StorageError::not_found(format!("permission `{}` does not exist", perm.name()))
                    .with_backend(BACKEND)
            })
    }

    fn alias_taken(&self, record: &ItemRecord) -> bool {
        let Some(alias) = record.alias.as_deref() else {
            return false;
        };
        self.items.values().any(|other| {
            other.id != record.id && other.tree == record.tree && other.alias.as_deref() == Some(alias)
        })
    }

    /// Check that `record.parent` exists in the same tree and does not lead back to `record`.
    fn validate_parent(&self, record: &ItemRecord) -> Result<(), StorageError> {
        let Some(parent_id) = record.parent else {
            return Ok(());
        };
        let parent = self.items.get(&parent_id).ok_or_else(|| {
            StorageError::not_found(format!("parent item {parent_id} does not exist"))
                .with_backend(BACKEND)
                .with_tree(&record.tree)
        })?;
        if parent.tree != record.tree {
            return Err(StorageError::invalid(format!(
                "parent item {parent_id} belongs to tree `{}`",
                parent.tree
            ))
            .with_backend(BACKEND)
            .with_tree(&record.tree));
        }

        let mut current = Some(parent_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == record.id || steps > self.items.len() {
                return Err(StorageError::invalid(format!(
                    "item {} cannot be placed under {parent_id}: parent chain forms a cycle",
                    record.id
                ))
                .with_backend(BACKEND)
                .with_tree(&record.tree));
            }
            current = self.items.get(&id).and_then(|item| item.parent);
            steps += 1;
        }
        Ok(())
    }

    fn descendants(&self, root: i64) -> BTreeSet<i64> {
        let mut found = BTreeSet::from([root]);
        loop {
            let before = found.len();
            for item in self.items.values() {
                if item.parent.is_some_and(|p| found.contains(&p)) {
                    found.insert(item.id);
                }
            }
            if found.len() == before {
                return found;
            }
        }
    }
}

/// In-memory [`Storage`] with invariant-enforcing writes.
///
/// Writes follow the tree model rules:
/// - a `sort_order` of `0` is replaced by the item's id
/// - an item saved as its own parent keeps its previous parent (or none)
/// - item aliases are unique within a tree; blank aliases are stored as `None`
/// - parent chains may not form cycles
/// - deleting an item deletes its descendants
///
/// Every successful write is reported to receivers obtained from
/// [`Storage::watch`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
    watchers: Mutex<Vec<mpsc::Sender<StorageEvent>>>,
}

impl MemoryStorage {
    /// Create a new empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-populated from a fixture.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the fixture violates a model invariant.
    pub fn from_fixture(fixture: Fixture) -> Result<Self, StorageError> {
        let storage = Self::new();
        storage.load_fixture(fixture)?;
        Ok(storage)
    }

    fn emit(&self, entity: Entity, kind: StorageEventKind, tree: Option<&str>) {
        let event = StorageEvent {
            entity,
            kind,
            tree: tree.map(str::to_owned),
        };
        tracing::debug!(?entity, ?kind, tree = ?event.tree, "Storage write");
        // Receivers that went away are dropped from the list
        self.watchers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Create a tree or update the title of an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the alias is empty.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn save_tree(&self, alias: &str, title: &str) -> Result<TreeRecord, StorageError> {
        if alias.trim().is_empty() {
            return Err(StorageError::invalid("tree alias cannot be empty").with_backend(BACKEND));
        }

        let (record, kind) = {
            let mut state = self.state.write().unwrap();
            let existing = state.trees.get(alias).map(|tree| tree.id);
            let (id, kind) = match existing {
                Some(id) => (id, StorageEventKind::Modified),
                None => (next_id(&mut state.last_tree_id), StorageEventKind::Created),
            };
            let record = TreeRecord {
                id,
                alias: alias.to_owned(),
                title: title.to_owned(),
            };
            state.trees.insert(alias.to_owned(), record.clone());
            (record, kind)
        };

        self.emit(Entity::Tree, kind, Some(alias));
        Ok(record)
    }

    /// Delete a tree together with all of its items.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the tree does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn delete_tree(&self, alias: &str) -> Result<(), StorageError> {
        {
            let mut state = self.state.write().unwrap();
            if state.trees.remove(alias).is_none() {
                return Err(StorageError::not_found(format!("tree `{alias}` does not exist"))
                    .with_backend(BACKEND));
            }
            state.items.retain(|_, item| item.tree != alias);
        }

        self.emit(Entity::Tree, StorageEventKind::Removed, Some(alias));
        Ok(())
    }

    /// Insert or update an item, returning its id.
    ///
    /// An `id` of `0` inserts a new item with a freshly assigned id. The
    /// permissions listed in `access_permissions` must exist in the catalog
    /// (matched by id, then by name).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the tree, parent or a permission does not
    /// exist, if the alias is already used in the tree, or if the parent chain
    /// would form a cycle.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn save_item(&self, mut record: ItemRecord) -> Result<i64, StorageError> {
        let saved = {
            let mut state = self.state.write().unwrap();

            if !state.tree_exists(&record.tree) {
                return Err(
                    StorageError::not_found(format!("tree `{}` does not exist", record.tree))
                        .with_backend(BACKEND),
                );
            }

            let previous = state.items.get(&record.id).cloned();
            if let Some(previous) = &previous
                && previous.tree != record.tree
            {
                return Err(StorageError::invalid(format!(
                    "item {} cannot move between trees",
                    record.id
                ))
                .with_backend(BACKEND)
                .with_tree(&record.tree));
            }

            let kind = if previous.is_some() {
                StorageEventKind::Modified
            } else {
                StorageEventKind::Created
            };
            if record.id == 0 {
                record.id = next_id(&mut state.last_item_id);
            } else {
                state.last_item_id = state.last_item_id.max(record.id);
            }

            // An item can't be its own parent: keep whatever it had before
            if record.parent == Some(record.id) {
                record.parent = previous.as_ref().and_then(|p| p.parent);
            }
            state.validate_parent(&record)?;

            record.alias = normalize_alias(record.alias.take());
            if state.alias_taken(&record) {
                return Err(StorageError::already_exists(format!(
                    "item alias `{}` is already used",
                    record.alias.as_deref().unwrap_or_default()
                ))
                .with_backend(BACKEND)
                .with_tree(&record.tree));
            }

            if record.sort_order == 0 {
                record.sort_order = record.id;
            }

            record.access_permissions = record
                .access_permissions
                .iter()
                .map(|perm| state.resolve_permission(perm))
                .collect::<Result<_, _>>()?;

            let saved = (record.id, kind, record.tree.clone());
            state.items.insert(record.id, record);
            saved
        };

        let (id, kind, tree) = saved;
        self.emit(Entity::Item, kind, Some(&tree));
        Ok(id)
    }

    /// Delete an item and all of its descendants.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the item does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn delete_item(&self, id: i64) -> Result<(), StorageError> {
        let tree = {
            let mut state = self.state.write().unwrap();
            let tree = state
                .items
                .get(&id)
                .map(|item| item.tree.clone())
                .ok_or_else(|| {
                    StorageError::not_found(format!("item {id} does not exist")).with_backend(BACKEND)
                })?;
            let doomed = state.descendants(id);
            state.items.retain(|item_id, _| !doomed.contains(item_id));
            tree
        };

        self.emit(Entity::Item, StorageEventKind::Removed, Some(&tree));
        Ok(())
    }

    /// Replace the permission set of an item.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the item or one of the permissions does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn set_item_permissions(
        &self,
        item_id: i64,
        permission_ids: &[i64],
    ) -> Result<(), StorageError> {
        let tree = {
            let mut state = self.state.write().unwrap();
            let permissions = permission_ids
                .iter()
                .map(|id| {
                    state.permissions.get(id).cloned().ok_or_else(|| {
                        StorageError::not_found(format!("permission {id} does not exist"))
                            .with_backend(BACKEND)
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let item = state.items.get_mut(&item_id).ok_or_else(|| {
                StorageError::not_found(format!("item {item_id} does not exist"))
                    .with_backend(BACKEND)
            })?;
            item.access_permissions = permissions;
            item.tree.clone()
        };

        self.emit(Entity::ItemPermissions, StorageEventKind::Modified, Some(&tree));
        Ok(())
    }

    /// Register a permission, returning the existing one if already known.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if either part of the name is empty.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn save_permission(
        &self,
        app_label: &str,
        codename: &str,
    ) -> Result<Permission, StorageError> {
        if app_label.is_empty() || codename.is_empty() {
            return Err(StorageError::invalid(format!(
                "permission `{app_label}.{codename}` needs both an app label and a code name"
            ))
            .with_backend(BACKEND));
        }

        let permission = {
            let mut state = self.state.write().unwrap();
            if let Some(existing) = state
                .permissions
                .values()
                .find(|p| p.app_label == app_label && p.codename == codename)
            {
                return Ok(existing.clone());
            }
            let permission = Permission {
                id: next_id(&mut state.last_permission_id),
                app_label: app_label.to_owned(),
                codename: codename.to_owned(),
            };
            state.permissions.insert(permission.id, permission.clone());
            permission
        };

        self.emit(Entity::Permission, StorageEventKind::Created, None);
        Ok(permission)
    }

    /// Load a fixture, keeping the ids it carries.
    ///
    /// The fixture is applied to a copy of the current state and only swapped
    /// in once every row passes validation, so a bad fixture leaves the
    /// storage untouched. Items may reference parents listed later in the
    /// fixture.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if any row violates a model invariant.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn load_fixture(&self, fixture: Fixture) -> Result<(), StorageError> {
        let touched = {
            let mut state = self.state.write().unwrap();
            let mut next = state.clone();
            let mut touched = BTreeSet::new();

            for perm in fixture.permissions {
                let id = if perm.id == 0 {
                    next_id(&mut next.last_permission_id)
                } else {
                    perm.id
                };
                next.last_permission_id = next.last_permission_id.max(id);
                next.permissions.insert(id, Permission { id, ..perm });
            }

            for tree in fixture.trees {
                let id = if tree.id == 0 {
                    next_id(&mut next.last_tree_id)
                } else {
                    tree.id
                };
                next.last_tree_id = next.last_tree_id.max(id);
                touched.insert(tree.alias.clone());
                next.trees.insert(tree.alias.clone(), TreeRecord { id, ..tree });
            }

            let mut loaded = Vec::with_capacity(fixture.items.len());
            for mut item in fixture.items {
                if !next.tree_exists(&item.tree) {
                    return Err(
                        StorageError::not_found(format!("tree `{}` does not exist", item.tree))
                            .with_backend(BACKEND),
                    );
                }
                if item.id == 0 {
                    item.id = next_id(&mut next.last_item_id);
                }
                next.last_item_id = next.last_item_id.max(item.id);
                if item.parent == Some(item.id) {
                    item.parent = None;
                }
                if item.sort_order == 0 {
                    item.sort_order = item.id;
                }
                item.alias = normalize_alias(item.alias.take());
                item.access_permissions = item
                    .access_permissions
                    .iter()
                    .map(|perm| next.resolve_permission(perm))
                    .collect::<Result<_, _>>()?;
                touched.insert(item.tree.clone());
                loaded.push(item.id);
                next.items.insert(item.id, item);
            }

            // Parents and aliases are checked once every row is in place
            for id in loaded {
                let item = &next.items[&id];
                next.validate_parent(item)?;
                if next.alias_taken(item) {
                    return Err(StorageError::already_exists(format!(
                        "item alias `{}` is already used",
                        item.alias.as_deref().unwrap_or_default()
                    ))
                    .with_backend(BACKEND)
                    .with_tree(&item.tree));
                }
            }

            *state = next;
            touched
        };

        for tree in &touched {
            self.emit(Entity::Tree, StorageEventKind::Modified, Some(tree));
        }
        Ok(())
    }

    /// Export trees as a fixture.
    ///
    /// With an empty `aliases` slice every tree is exported. When `items_only`
    /// is set, tree rows are left out. Permissions referenced by the exported
    /// items are always included so the fixture loads on its own.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn dump(&self, aliases: &[String], items_only: bool) -> Fixture {
        let state = self.state.read().unwrap();
        let wanted = |alias: &str| aliases.is_empty() || aliases.iter().any(|a| a == alias);

        let mut trees: Vec<TreeRecord> = state
            .trees
            .values()
            .filter(|tree| wanted(&tree.alias))
            .cloned()
            .collect();
        trees.sort_by_key(|tree| tree.id);

        let items: Vec<ItemRecord> = state
            .items
            .values()
            .filter(|item| wanted(&item.tree))
            .cloned()
            .collect();

        let permission_ids: BTreeSet<i64> = items
            .iter()
            .flat_map(|item| item.access_permissions.iter().map(|p| p.id))
            .collect();
        let permissions = permission_ids
            .iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect();

        Fixture {
            permissions,
            trees: if items_only { Vec::new() } else { trees },
            items,
        }
    }
}

impl PermissionCatalog for MemoryStorage {
    fn permission_by_name(
        &self,
        app_label: &str,
        codename: &str,
    ) -> Result<Option<Permission>, StorageError> {
        let state = self.state.read().unwrap();
        Ok(state
            .permissions
            .values()
            .find(|p| p.app_label == app_label && p.codename == codename)
            .cloned())
    }

    fn permission_by_id(&self, id: i64) -> Result<Option<Permission>, StorageError> {
        Ok(self.state.read().unwrap().permissions.get(&id).cloned())
    }
}

impl Storage for MemoryStorage {
    fn tree_items(&self, alias: &str) -> Result<Vec<ItemRecord>, StorageError> {
        let state = self.state.read().unwrap();
        let parent_order = |item: &ItemRecord| {
            item.parent
                .and_then(|p| state.items.get(&p))
                .map(|parent| parent.sort_order)
        };

        let mut items: Vec<ItemRecord> = state
            .items
            .values()
            .filter(|item| item.tree == alias)
            .cloned()
            .collect();
        items.sort_by_key(|item| (parent_order(item), item.sort_order, item.id));
        Ok(items)
    }

    fn count_trees(&self, alias: &str) -> Result<usize, StorageError> {
        Ok(usize::from(self.state.read().unwrap().tree_exists(alias)))
    }

    fn trees(&self) -> Result<Vec<TreeRecord>, StorageError> {
        let state = self.state.read().unwrap();
        let mut trees: Vec<TreeRecord> = state.trees.values().cloned().collect();
        trees.sort_by_key(|tree| tree.id);
        Ok(trees)
    }

    fn watch(&self) -> Result<StorageEventReceiver, StorageError> {
        let (tx, rx) = mpsc::channel();
        self.watchers.lock().unwrap().push(tx);
        Ok(StorageEventReceiver::new(rx))
    }
}
