//! Trees declared in code and process-wide registrations.
//!
//! Dynamic trees are built with [`tree`] and [`item`], grouped with
//! [`compose`], and registered on a [`NavRegistry`]. A registered tree is
//! either an orphan (addressed by its own alias) or an attachment spliced into
//! a stored tree, under an aliased item or at the tree root.
//!
//! ```
//! use navtree::{NavRegistry, compose, item, tree};
//!
//! let articles = tree("articles", "Articles", vec![
//!     item("Latest", "articles_latest").children(vec![
//!         item("Archive", "articles_archive"),
//!     ]),
//! ]);
//!
//! let mut registry = NavRegistry::new();
//! registry.register_dynamic_trees(vec![
//!     compose(vec![articles]).attach_to("main", Some("blog")),
//! ]);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use navtree_storage::{PermType, Permission, PermissionCatalog};
use serde_json::{Map, Value};

use crate::error::{NavError, PermissionSpecError};
use crate::hook::{AccessCheck, ItemsHook};
use crate::model::TreeItem;

/// A permission reference on a dynamic item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionSpec {
    /// Qualified name, `app_label.codename`.
    Name(String),
    /// Catalog id.
    Id(i64),
    /// Resolved permission.
    Permission(Permission),
}

impl From<&str> for PermissionSpec {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for PermissionSpec {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<i64> for PermissionSpec {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<Permission> for PermissionSpec {
    fn from(permission: Permission) -> Self {
        Self::Permission(permission)
    }
}

impl PermissionSpec {
    /// Resolve against the permission catalog.
    fn clean<C: PermissionCatalog + ?Sized>(self, catalog: &C) -> Result<Permission, NavError> {
        match self {
            Self::Permission(permission) => Ok(permission),
            Self::Id(id) => catalog
                .permission_by_id(id)?
                .ok_or_else(|| PermissionSpecError::UnknownId(id).into()),
            Self::Name(name) => {
                let mut parts = name.split('.');
                let (Some(app_label), Some(codename), None) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    return Err(PermissionSpecError::Format(name).into());
                };
                catalog
                    .permission_by_name(app_label, codename)?
                    .ok_or_else(|| PermissionSpecError::Unknown(name.clone()).into())
            }
        }
    }
}

/// An item of a dynamic tree, with its children.
///
/// Created with [`item`]. Unlike stored items, dynamic items treat their URL
/// as a route pattern by default and require *all* listed permissions.
#[derive(Clone, Debug)]
pub struct DynamicItem {
    title: String,
    url: String,
    url_as_pattern: bool,
    hint: String,
    alias: Option<String>,
    description: String,
    in_menu: bool,
    in_breadcrumbs: bool,
    in_sitetree: bool,
    access_loggedin: bool,
    access_guest: bool,
    permissions: Vec<Permission>,
    restricted: bool,
    perms_mode_all: bool,
    sort_order: i64,
    dynamic_attrs: Map<String, Value>,
    access_check: Option<String>,
    children: Vec<DynamicItem>,
}

/// Declare a dynamic item.
pub fn item(title: impl Into<String>, url: impl Into<String>) -> DynamicItem {
    DynamicItem {
        title: title.into(),
        url: url.into(),
        url_as_pattern: true,
        hint: String::new(),
        alias: None,
        description: String::new(),
        in_menu: true,
        in_breadcrumbs: true,
        in_sitetree: true,
        access_loggedin: false,
        access_guest: false,
        permissions: Vec::new(),
        restricted: false,
        perms_mode_all: true,
        sort_order: 0,
        dynamic_attrs: Map::new(),
        access_check: None,
        children: Vec::new(),
    }
}

impl DynamicItem {
    /// Set the child items.
    #[must_use]
    pub fn children(mut self, children: impl IntoIterator<Item = DynamicItem>) -> Self {
        self.children = children.into_iter().collect();
        self
    }

    /// Treat the URL as a route pattern (default) or a literal path.
    #[must_use]
    pub fn url_as_pattern(mut self, pattern: bool) -> Self {
        self.url_as_pattern = pattern;
        self
    }

    #[must_use]
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    /// Alias used to address the item, e.g. as an attachment point.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into()).filter(|a: &String| !a.is_empty());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn in_menu(mut self, show: bool) -> Self {
        self.in_menu = show;
        self
    }

    #[must_use]
    pub fn in_breadcrumbs(mut self, show: bool) -> Self {
        self.in_breadcrumbs = show;
        self
    }

    #[must_use]
    pub fn in_sitetree(mut self, show: bool) -> Self {
        self.in_sitetree = show;
        self
    }

    /// Show only to authenticated users.
    #[must_use]
    pub fn access_loggedin(mut self, only: bool) -> Self {
        self.access_loggedin = only;
        self
    }

    /// Show only to anonymous users.
    #[must_use]
    pub fn access_guest(mut self, only: bool) -> Self {
        self.access_guest = only;
        self
    }

    /// Restrict the item to users holding the given permissions.
    ///
    /// Permissions are resolved immediately, so a bad declaration fails at
    /// startup rather than at render time. An empty list leaves the item
    /// unrestricted.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::PermissionSpec`] for a malformed name or unknown
    /// permission, and [`NavError::Storage`] if the catalog cannot be queried.
    pub fn access_by_perms<C, I, P>(mut self, catalog: &C, perms: I) -> Result<Self, NavError>
    where
        C: PermissionCatalog + ?Sized,
        I: IntoIterator<Item = P>,
        P: Into<PermissionSpec>,
    {
        self.permissions = perms
            .into_iter()
            .map(|spec| spec.into().clean(catalog))
            .collect::<Result<_, _>>()?;
        self.restricted = !self.permissions.is_empty();
        Ok(self)
    }

    /// Require all permissions (default) or any one of them.
    #[must_use]
    pub fn perms_mode_all(mut self, all: bool) -> Self {
        self.perms_mode_all = all;
        self
    }

    #[must_use]
    pub fn sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Attach an extra attribute, readable through `get_current_page_attr`.
    #[must_use]
    pub fn dynamic_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.dynamic_attrs.insert(key.into(), value.into());
        self
    }

    /// Consult the access check registered under `name` before the standard checks.
    #[must_use]
    pub fn access_check(mut self, name: impl Into<String>) -> Self {
        self.access_check = Some(name.into());
        self
    }

    /// Flatten into `out` depth-first, assigning local ids from 1.
    fn flatten(self, parent: Option<i64>, out: &mut Vec<TreeItem>) {
        let id = i64::try_from(out.len()).unwrap_or(i64::MAX) + 1;
        let children = self.children;
        out.push(TreeItem {
            id,
            parent,
            title: self.title,
            hint: self.hint,
            url: self.url,
            urlaspattern: self.url_as_pattern,
            alias: self.alias,
            description: self.description,
            sort_order: self.sort_order,
            inmenu: self.in_menu,
            inbreadcrumbs: self.in_breadcrumbs,
            insitetree: self.in_sitetree,
            access_loggedin: self.access_loggedin,
            access_guest: self.access_guest,
            access_restricted: self.restricted,
            access_permissions: self.permissions,
            access_perm_type: if self.perms_mode_all {
                PermType::All
            } else {
                PermType::Any
            },
            is_dynamic: true,
            dynamic_attrs: self.dynamic_attrs,
            access_check: self.access_check,
            ..TreeItem::default()
        });
        for child in children {
            child.flatten(Some(id), out);
        }
    }
}

/// A tree declared in code.
#[derive(Clone, Debug)]
pub struct DynamicTree {
    alias: String,
    title: String,
    /// Depth-first, with local ids starting at 1.
    items: Vec<TreeItem>,
}

/// Declare a dynamic tree.
pub fn tree(
    alias: impl Into<String>,
    title: impl Into<String>,
    items: impl IntoIterator<Item = DynamicItem>,
) -> DynamicTree {
    let mut flat = Vec::new();
    for item in items {
        item.flatten(None, &mut flat);
    }
    DynamicTree {
        alias: alias.into(),
        title: title.into(),
        items: flat,
    }
}

impl DynamicTree {
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of items, children included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clone the items for `tree_alias` with fresh ids.
    ///
    /// Root items are placed under `parent` (or left at the root).
    fn instantiate(&self, tree_alias: &str, parent: Option<i64>, ids: &mut SyntheticIds) -> Vec<TreeItem> {
        let fresh: HashMap<i64, i64> = self.items.iter().map(|i| (i.id, ids.next())).collect();
        self.items
            .iter()
            .map(|source| {
                let mut item = source.clone();
                item.id = fresh.get(&source.id).copied().unwrap_or(source.id);
                item.tree = tree_alias.to_owned();
                item.parent = match source.parent {
                    Some(local) => fresh.get(&local).copied(),
                    None => parent,
                };
                item
            })
            .collect()
    }
}

/// Id source for dynamic items within one merge.
///
/// Ids count down from -1 so they never clash with stored (positive) ids.
#[derive(Default)]
struct SyntheticIds {
    last: i64,
}

impl SyntheticIds {
    fn next(&mut self) -> i64 {
        self.last -= 1;
        self.last
    }
}

/// A group of dynamic trees and where to put them.
///
/// Created with [`compose`].
#[derive(Clone, Debug)]
pub struct DynamicSource {
    trees: Vec<DynamicTree>,
    target_tree: Option<String>,
    parent_item: Option<String>,
}

/// Group dynamic trees for registration.
///
/// Without [`attach_to`](DynamicSource::attach_to) each tree is registered
/// as an orphan under its own alias.
pub fn compose(trees: impl IntoIterator<Item = DynamicTree>) -> DynamicSource {
    DynamicSource {
        trees: trees.into_iter().collect(),
        target_tree: None,
        parent_item: None,
    }
}

impl DynamicSource {
    /// Attach the items to `tree_alias`, under the item aliased `parent_item`
    /// or at the tree root when `None`.
    #[must_use]
    pub fn attach_to(mut self, tree_alias: impl Into<String>, parent_item: Option<&str>) -> Self {
        self.target_tree = Some(tree_alias.into());
        self.parent_item = parent_item.map(str::to_owned);
        self
    }

    /// Keep only trees with the given aliases.
    #[must_use]
    pub fn include_trees(mut self, aliases: &[&str]) -> Self {
        self.trees.retain(|t| aliases.contains(&t.alias.as_str()));
        self
    }
}

/// Process-wide registrations: dynamic trees, i18n trees, the items hook and
/// named access checks.
///
/// Built at startup and read-only while requests are served; resolvers hold
/// a shared snapshot.
#[derive(Clone, Default)]
pub struct NavRegistry {
    orphans: HashMap<String, Vec<DynamicTree>>,
    attachments: HashMap<(String, Option<String>), Vec<DynamicTree>>,
    i18n_trees: Vec<String>,
    items_hook: Option<Arc<dyn ItemsHook>>,
    access_checks: HashMap<String, Arc<dyn AccessCheck>>,
}

impl std::fmt::Debug for NavRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavRegistry")
            .field("orphans", &self.orphans.keys().collect::<Vec<_>>())
            .field("attachments", &self.attachments.keys().collect::<Vec<_>>())
            .field("i18n_trees", &self.i18n_trees)
            .field("items_hook", &self.items_hook.is_some())
            .field("access_checks", &self.access_checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NavRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register dynamic trees. Later registrations add to earlier ones.
    pub fn register_dynamic_trees(&mut self, sources: impl IntoIterator<Item = DynamicSource>) {
        for source in sources {
            let count = source.trees.len();
            if let Some(target) = source.target_tree {
                tracing::info!(
                    target_tree = %target,
                    parent_item = ?source.parent_item,
                    count,
                    "Registered dynamic tree attachment"
                );
                self.attachments
                    .entry((target, source.parent_item))
                    .or_default()
                    .extend(source.trees);
            } else {
                tracing::info!(count, "Registered orphan dynamic trees");
                for tree in source.trees {
                    self.orphans.entry(tree.alias.clone()).or_default().push(tree);
                }
            }
        }
    }

    /// Declare trees that have per-language variants named `{alias}_{language}`.
    pub fn register_i18n_trees<I, S>(&mut self, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.i18n_trees = aliases.into_iter().map(Into::into).collect();
    }

    /// Install the items hook, replacing any previous one.
    pub fn register_items_hook(&mut self, hook: impl ItemsHook + 'static) {
        self.items_hook = Some(Arc::new(hook));
    }

    /// Register an access check referenced by [`DynamicItem::access_check`].
    pub fn register_access_check(
        &mut self,
        name: impl Into<String>,
        check: impl AccessCheck + 'static,
    ) {
        self.access_checks.insert(name.into(), Arc::new(check));
    }

    /// Whether `alias` has per-language variants.
    #[must_use]
    pub fn is_i18n_tree(&self, alias: &str) -> bool {
        self.i18n_trees.iter().any(|a| a == alias)
    }

    /// Whether an orphan dynamic tree is registered under `alias`.
    #[must_use]
    pub fn has_orphan_tree(&self, alias: &str) -> bool {
        self.orphans.contains_key(alias)
    }

    pub(crate) fn items_hook(&self) -> Option<&dyn ItemsHook> {
        self.items_hook.as_deref()
    }

    pub(crate) fn access_check(&self, name: &str) -> Option<&dyn AccessCheck> {
        self.access_checks.get(name).map(Arc::as_ref)
    }

    fn has_dynamic_trees(&self) -> bool {
        !self.orphans.is_empty() || !self.attachments.is_empty()
    }

    /// Merge dynamic trees into the stored items of `tree_alias`.
    ///
    /// - With no stored items, the orphan trees registered under `tree_alias`
    ///   make up the whole tree.
    /// - Otherwise each stored item is followed by the trees attached under
    ///   its alias, and root attachments go last.
    ///
    /// Dynamic items are cloned on every call and receive fresh negative ids,
    /// so a tree attached under two parents yields two distinct sets of items.
    #[must_use]
    pub fn merge(&self, tree_alias: &str, stored: Vec<TreeItem>) -> Vec<TreeItem> {
        if !self.has_dynamic_trees() {
            return stored;
        }

        let mut ids = SyntheticIds::default();

        if stored.is_empty() {
            return self
                .orphans
                .get(tree_alias)
                .into_iter()
                .flatten()
                .flat_map(|tree| tree.instantiate(tree_alias, None, &mut ids))
                .collect();
        }

        let mut merged = Vec::with_capacity(stored.len());
        for item in stored {
            let key = item
                .alias
                .clone()
                .filter(|a| !a.is_empty())
                .map(|alias| (tree_alias.to_owned(), Some(alias)));
            let parent_id = item.id;
            merged.push(item);

            if let Some(key) = key
                && let Some(trees) = self.attachments.get(&key)
            {
                for tree in trees {
                    merged.extend(tree.instantiate(tree_alias, Some(parent_id), &mut ids));
                }
            }
        }

        if let Some(trees) = self.attachments.get(&(tree_alias.to_owned(), None)) {
            for tree in trees {
                merged.extend(tree.instantiate(tree_alias, None, &mut ids));
            }
        }

        tracing::debug!(tree = tree_alias, items = merged.len(), "Merged dynamic trees");
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_storage::{MemoryStorage, StorageErrorKind};
    use pretty_assertions::assert_eq;

    fn stored(id: i64, parent: Option<i64>, alias: Option<&str>) -> TreeItem {
        TreeItem {
            id,
            tree: "main".to_owned(),
            parent,
            title: format!("item {id}"),
            alias: alias.map(str::to_owned),
            ..TreeItem::default()
        }
    }

    fn catalog() -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage.save_permission("shop", "view").unwrap();
        storage.save_permission("shop", "edit").unwrap();
        storage
    }

    fn ids(items: &[TreeItem]) -> Vec<i64> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_item_defaults() {
        let t = tree("dyn", "", vec![item("Home", "home")]);
        let home = &t.items[0];

        assert!(home.urlaspattern);
        assert!(home.is_dynamic);
        assert_eq!(home.access_perm_type, PermType::All);
        assert!(!home.access_restricted);
        assert!(home.inmenu && home.inbreadcrumbs && home.insitetree);
    }

    #[test]
    fn test_tree_flattens_depth_first() {
        let t = tree(
            "dyn",
            "Dynamic",
            vec![
                item("A", "a").children(vec![item("A1", "a1"), item("A2", "a2")]),
                item("B", "b"),
            ],
        );

        let titles: Vec<_> = t.items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "A1", "A2", "B"]);
        let parents: Vec<_> = t.items.iter().map(|i| i.parent).collect();
        assert_eq!(parents, vec![None, Some(1), Some(1), None]);
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn test_access_by_perms_accepts_all_spec_forms() {
        let catalog = catalog();
        let edit = catalog.permission_by_name("shop", "edit").unwrap().unwrap();

        let dynamic = item("Orders", "orders")
            .access_by_perms(
                &catalog,
                vec![
                    PermissionSpec::from("shop.view"),
                    PermissionSpec::from(edit.id),
                    PermissionSpec::from(edit.clone()),
                ],
            )
            .unwrap();

        assert!(dynamic.restricted);
        assert_eq!(dynamic.permissions.len(), 3);
        assert_eq!(dynamic.permissions[1], edit);
    }

    #[test]
    fn test_access_by_perms_rejects_bad_specs() {
        let catalog = catalog();

        let err = item("X", "x").access_by_perms(&catalog, ["noformat"]).unwrap_err();
        assert!(matches!(
            err,
            NavError::PermissionSpec(PermissionSpecError::Format(_))
        ));

        let err = item("X", "x").access_by_perms(&catalog, ["a.b.c"]).unwrap_err();
        assert!(matches!(
            err,
            NavError::PermissionSpec(PermissionSpecError::Format(_))
        ));

        let err = item("X", "x").access_by_perms(&catalog, ["shop.delete"]).unwrap_err();
        assert!(matches!(
            err,
            NavError::PermissionSpec(PermissionSpecError::Unknown(ref name)) if name == "shop.delete"
        ));

        let err = item("X", "x").access_by_perms(&catalog, [99_i64]).unwrap_err();
        assert!(matches!(
            err,
            NavError::PermissionSpec(PermissionSpecError::UnknownId(99))
        ));
    }

    #[test]
    fn test_access_by_perms_empty_list_unrestricted() {
        let dynamic = item("X", "x")
            .access_by_perms(&catalog(), Vec::<PermissionSpec>::new())
            .unwrap();
        assert!(!dynamic.restricted);
    }

    #[test]
    fn test_merge_without_dynamic_trees_is_identity() {
        let registry = NavRegistry::new();
        let items = vec![stored(1, None, None), stored(2, Some(1), None)];

        assert_eq!(registry.merge("main", items.clone()), items);
    }

    #[test]
    fn test_merge_orphan_tree_for_empty_store() {
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![compose(vec![tree(
            "dynamic",
            "",
            vec![item("A", "a").children(vec![item("A1", "a1")])],
        )])]);

        let merged = registry.merge("dynamic", Vec::new());

        assert_eq!(ids(&merged), vec![-1, -2]);
        assert_eq!(merged[1].parent, Some(-1));
        assert!(merged.iter().all(|i| i.tree == "dynamic"));
        assert!(registry.merge("other", Vec::new()).is_empty());
    }

    #[test]
    fn test_merge_orphans_ignored_when_store_has_items() {
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![compose(vec![tree("main", "", vec![item("A", "a")])])]);

        let merged = registry.merge("main", vec![stored(1, None, None)]);

        assert_eq!(ids(&merged), vec![1]);
    }

    #[test]
    fn test_merge_attaches_under_aliased_items() {
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![
            compose(vec![tree("articles", "", vec![item("Latest", "latest")])])
                .attach_to("main", Some("blog")),
            compose(vec![tree("extra", "", vec![item("Footer", "footer")])])
                .attach_to("main", None),
        ]);

        let merged = registry.merge(
            "main",
            vec![
                stored(1, None, Some("blog")),
                stored(2, None, None),
                stored(3, Some(2), None),
            ],
        );

        let titles: Vec<_> = merged.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["item 1", "Latest", "item 2", "item 3", "Footer"]);
        assert_eq!(merged[1].parent, Some(1));
        assert_eq!(merged[1].tree, "main");
        assert_eq!(merged[4].parent, None);
    }

    #[test]
    fn test_same_fragment_under_two_parents_gets_distinct_ids() {
        let fragment = tree("shared", "", vec![item("Help", "help")]);
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![
            compose(vec![fragment.clone()]).attach_to("main", Some("a")),
            compose(vec![fragment]).attach_to("main", Some("b")),
        ]);

        let merged = registry.merge(
            "main",
            vec![stored(1, None, Some("a")), stored(2, None, Some("b"))],
        );

        let helps: Vec<_> = merged.iter().filter(|i| i.title == "Help").collect();
        assert_eq!(helps.len(), 2);
        assert_ne!(helps[0].id, helps[1].id);
        assert_eq!(helps[0].url, helps[1].url);
        assert_eq!(helps[0].parent, Some(1));
        assert_eq!(helps[1].parent, Some(2));
    }

    #[test]
    fn test_merge_leaves_registered_trees_untouched() {
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![compose(vec![tree("dyn", "", vec![item("A", "a")])])]);

        let mut first = registry.merge("dyn", Vec::new());
        first[0].is_current = true;
        first[0].url_resolved = "/a/".to_owned();

        let second = registry.merge("dyn", Vec::new());
        assert!(!second[0].is_current);
        assert_eq!(second[0].url_resolved, "");
        assert_eq!(second[0].id, first[0].id);
    }

    #[test]
    fn test_include_trees_filters_source() {
        let mut registry = NavRegistry::new();
        registry.register_dynamic_trees(vec![
            compose(vec![
                tree("keep", "", vec![item("K", "k")]),
                tree("drop", "", vec![item("D", "d")]),
            ])
            .include_trees(&["keep"]),
        ]);

        assert!(registry.has_orphan_tree("keep"));
        assert!(!registry.has_orphan_tree("drop"));
    }

    #[test]
    fn test_i18n_registration() {
        let mut registry = NavRegistry::new();
        registry.register_i18n_trees(["main"]);

        assert!(registry.is_i18n_tree("main"));
        assert!(!registry.is_i18n_tree("footer"));
    }

    #[test]
    fn test_catalog_errors_surface_as_storage_errors() {
        struct Down;
        impl PermissionCatalog for Down {
            fn permission_by_name(
                &self,
                _: &str,
                _: &str,
            ) -> Result<Option<Permission>, navtree_storage::StorageError> {
                Err(navtree_storage::StorageError::new(StorageErrorKind::Unavailable))
            }
            fn permission_by_id(
                &self,
                _: i64,
            ) -> Result<Option<Permission>, navtree_storage::StorageError> {
                Err(navtree_storage::StorageError::new(StorageErrorKind::Unavailable))
            }
        }

        let err = item("X", "x").access_by_perms(&Down, ["shop.view"]).unwrap_err();
        assert!(matches!(err, NavError::Storage(_)));
    }
}
