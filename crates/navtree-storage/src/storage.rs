//! Storage trait, stored rows and error types.
//!
//! Provides the core [`Storage`] trait for reading navigation trees, the rows
//! it returns, and [`StorageError`] for unified error handling across backends.
//!
//! # Ordering Convention
//!
//! [`Storage::tree_items`] returns items ordered by the sort order of their
//! parent (root items first), then by their own sort order, then by id. The
//! resolution engine relies on this order when it builds children lists.

use serde::{Deserialize, Serialize};

use crate::event::StorageEventReceiver;

/// How a restricted item's permission set is interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermType {
    /// The user needs at least one of the listed permissions.
    #[default]
    Any,
    /// The user needs every listed permission.
    All,
}

/// A permission that can gate access to an item.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Storage identifier.
    #[serde(default)]
    pub id: i64,
    /// Application label (the part before the dot).
    pub app_label: String,
    /// Permission code name (the part after the dot).
    pub codename: String,
}

impl Permission {
    /// Fully qualified name, `"<app_label>.<codename>"`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}.{}", self.app_label, self.codename)
    }
}

/// A navigation tree as stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeRecord {
    /// Storage identifier.
    #[serde(default)]
    pub id: i64,
    /// Unique, case-sensitive alias used to address the tree.
    pub alias: String,
    /// Presentational title.
    #[serde(default)]
    pub title: String,
}

impl TreeRecord {
    /// Title for display, falling back to the alias.
    #[must_use]
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.alias
        } else {
            &self.title
        }
    }
}

/// A tree item as stored.
///
/// The permission set of restricted items is included eagerly so that
/// consumers never need per-item lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemRecord {
    /// Storage identifier. `0` asks the backend to assign one on save.
    pub id: i64,
    /// Alias of the owning tree.
    pub tree: String,
    /// Parent item id, `None` for root items.
    pub parent: Option<i64>,
    /// Title, possibly with `{{ var }}` placeholders.
    pub title: String,
    /// Short hint usually shown on hover.
    pub hint: String,
    /// Literal URL, or `"pattern-name arg1 arg2"` when `urlaspattern` is set.
    pub url: String,
    /// Whether `url` names a URL pattern to reverse.
    pub urlaspattern: bool,
    /// Alias unique within the tree, used for cross-references.
    pub alias: Option<String>,
    /// Free-form description, not shown in navigation.
    pub description: String,
    /// Position among siblings. `0` on save means "use the id".
    pub sort_order: i64,
    /// Hidden from every navigation type.
    pub hidden: bool,
    /// Shown in menus.
    pub inmenu: bool,
    /// Shown in breadcrumbs.
    pub inbreadcrumbs: bool,
    /// Shown in full site trees.
    pub insitetree: bool,
    /// Visible to authenticated users only.
    pub access_loggedin: bool,
    /// Visible to anonymous users only.
    pub access_guest: bool,
    /// Gated by `access_permissions`.
    pub access_restricted: bool,
    /// Permissions granting access when `access_restricted` is set.
    pub access_permissions: Vec<Permission>,
    /// How `access_permissions` combine.
    pub access_perm_type: PermType,
}

impl Default for ItemRecord {
    fn default() -> Self {
        Self {
            id: 0,
            tree: String::new(),
            parent: None,
            title: String::new(),
            hint: String::new(),
            url: String::new(),
            urlaspattern: false,
            alias: None,
            description: String::new(),
            sort_order: 0,
            hidden: false,
            inmenu: true,
            inbreadcrumbs: true,
            insitetree: true,
            access_loggedin: false,
            access_guest: false,
            access_restricted: false,
            access_permissions: Vec::new(),
            access_perm_type: PermType::Any,
        }
    }
}

impl ItemRecord {
    /// Create an unsaved item with default visibility.
    #[must_use]
    pub fn new(tree: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            tree: tree.into(),
            title: title.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the parent item.
    #[must_use]
    pub fn with_parent(mut self, parent: i64) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set the item alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Semantic error categories.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StorageErrorKind {
    /// Tree, item or permission does not exist.
    NotFound,
    /// Unique constraint violated (tree alias, item alias within a tree).
    AlreadyExists,
    /// Row violates a model invariant (e.g., a parent cycle) or cannot be decoded.
    InvalidData,
    /// Backend is temporarily unavailable.
    Unavailable,
    /// Other/unknown error category.
    Other,
}

/// Storage error with semantic kind and backend-specific source.
#[derive(Debug)]
pub struct StorageError {
    /// Semantic error category.
    pub kind: StorageErrorKind,
    /// Tree alias context (if applicable).
    pub tree: Option<String>,
    /// Backend identifier (e.g., "Memory").
    pub backend: Option<&'static str>,
    message: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StorageError {
    /// Create a new storage error.
    #[must_use]
    pub fn new(kind: StorageErrorKind) -> Self {
        Self {
            kind,
            tree: None,
            backend: None,
            message: None,
            source: None,
        }
    }

    /// Attach tree alias context.
    #[must_use]
    pub fn with_tree(mut self, tree: impl Into<String>) -> Self {
        self.tree = Some(tree.into());
        self
    }

    /// Attach backend identifier.
    #[must_use]
    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Attach a human-readable detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Downcast the source error to a concrete type.
    #[must_use]
    pub fn downcast_source<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.source.as_ref()?.downcast_ref()
    }

    /// Create a not found error with a detail message.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::NotFound).with_message(message)
    }

    /// Create a unique-constraint error with a detail message.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::AlreadyExists).with_message(message)
    }

    /// Create an invariant-violation error with a detail message.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StorageErrorKind::InvalidData).with_message(message)
    }

    /// Create a storage error from an I/O error.
    #[must_use]
    pub fn io(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => StorageErrorKind::NotFound,
            std::io::ErrorKind::InvalidData => StorageErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => StorageErrorKind::Unavailable,
            _ => StorageErrorKind::Other,
        };
        Self::new(kind).with_source(err)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format: "[Backend] Kind: message: source (tree: alias)"
        if let Some(backend) = self.backend {
            write!(f, "[{backend}] ")?;
        }

        let kind_str = match self.kind {
            StorageErrorKind::NotFound => "Not found",
            StorageErrorKind::AlreadyExists => "Already exists",
            StorageErrorKind::InvalidData => "Invalid data",
            StorageErrorKind::Unavailable => "Unavailable",
            StorageErrorKind::Other => "Error",
        };

        write!(f, "{kind_str}")?;

        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        if let Some(tree) = &self.tree {
            write!(f, " (tree: {tree})")?;
        }

        Ok(())
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|s| s.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Permission lookups used to validate access declarations eagerly.
pub trait PermissionCatalog {
    /// Find a permission by application label and code name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be queried.
    fn permission_by_name(
        &self,
        app_label: &str,
        codename: &str,
    ) -> Result<Option<Permission>, StorageError>;

    /// Find a permission by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be queried.
    fn permission_by_id(&self, id: i64) -> Result<Option<Permission>, StorageError>;
}

/// Storage abstraction for navigation trees.
///
/// Read-side contract consumed by the resolution engine. Write operations are
/// backend specific; backends that support writes report them through
/// [`watch`](Storage::watch) so that caches can invalidate.
pub trait Storage: PermissionCatalog + Send + Sync {
    /// Return all items of the tree with the given alias.
    ///
    /// Items are ordered by (parent sort order, sort order, id), root items
    /// first, each with its permission set included. An unknown alias yields
    /// an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be queried.
    fn tree_items(&self, alias: &str) -> Result<Vec<ItemRecord>, StorageError>;

    /// Count trees stored under exactly this alias (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be queried.
    fn count_trees(&self, alias: &str) -> Result<usize, StorageError>;

    /// Return every stored tree, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be queried.
    fn trees(&self) -> Result<Vec<TreeRecord>, StorageError>;

    /// Start receiving change notifications.
    ///
    /// Default implementation returns a no-op receiver for backends that
    /// cannot report changes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if watching cannot be started.
    fn watch(&self) -> Result<StorageEventReceiver, StorageError> {
        Ok(StorageEventReceiver::no_op())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_name() {
        let perm = Permission {
            id: 1,
            app_label: "blog".to_owned(),
            codename: "add_post".to_owned(),
        };

        assert_eq!(perm.name(), "blog.add_post");
    }

    #[test]
    fn test_tree_display_title_falls_back_to_alias() {
        let tree = TreeRecord {
            id: 1,
            alias: "main".to_owned(),
            title: String::new(),
        };
        assert_eq!(tree.display_title(), "main");

        let tree = TreeRecord {
            title: "Main menu".to_owned(),
            ..tree
        };
        assert_eq!(tree.display_title(), "Main menu");
    }

    #[test]
    fn test_item_record_defaults() {
        let item = ItemRecord::new("main", "Home", "/");

        assert_eq!(item.id, 0);
        assert!(item.inmenu);
        assert!(item.inbreadcrumbs);
        assert!(item.insitetree);
        assert!(!item.hidden);
        assert!(!item.urlaspattern);
        assert_eq!(item.access_perm_type, PermType::Any);
    }

    #[test]
    fn test_item_record_deserializes_with_defaults() {
        let item: ItemRecord =
            serde_json::from_str(r#"{"id": 3, "tree": "main", "title": "A", "url": "/a/"}"#)
                .unwrap();

        assert_eq!(item.id, 3);
        assert!(item.inmenu);
        assert!(item.parent.is_none());
    }

    #[test]
    fn test_perm_type_serialized_lowercase() {
        assert_eq!(serde_json::to_string(&PermType::All).unwrap(), "\"all\"");
        assert_eq!(
            serde_json::from_str::<PermType>("\"any\"").unwrap(),
            PermType::Any
        );
    }

    #[test]
    fn test_storage_error_display_simple() {
        let err = StorageError::new(StorageErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found");
    }

    #[test]
    fn test_storage_error_display_full() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StorageError::io(io_err)
            .with_backend("Memory")
            .with_tree("main");

        assert_eq!(err.kind, StorageErrorKind::NotFound);
        assert_eq!(err.to_string(), "[Memory] Not found: file not found (tree: main)");
    }

    #[test]
    fn test_storage_error_with_message() {
        let err = StorageError::already_exists("alias `home` is taken").with_tree("main");

        assert_eq!(err.kind, StorageErrorKind::AlreadyExists);
        assert_eq!(
            err.to_string(),
            "Already exists: alias `home` is taken (tree: main)"
        );
    }

    #[test]
    fn test_storage_error_downcast_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        let err = StorageError::io(io_err);

        assert_eq!(err.kind, StorageErrorKind::Unavailable);
        assert!(err.downcast_source::<std::io::Error>().is_some());
    }

    #[test]
    fn test_storage_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StorageError>();
    }
}
