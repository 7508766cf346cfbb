//! Tree items as seen by the resolution engine.

use std::collections::BTreeSet;
use std::fmt;

use navtree_storage::{ItemRecord, PermType, Permission};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Navigation channel an item list is assembled for.
///
/// Each channel has its own visibility flag on [`TreeItem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NavType {
    /// Menus (`inmenu`).
    Menu,
    /// Breadcrumb trails (`inbreadcrumbs`).
    Breadcrumbs,
    /// Full site trees (`insitetree`).
    Sitetree,
}

impl NavType {
    /// Name used in hook senders, e.g. `menu` or `sitetree.children`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Breadcrumbs => "breadcrumbs",
            Self::Sitetree => "sitetree",
        }
    }

    /// Whether the item's flag for this channel is set.
    #[must_use]
    pub fn shows(self, item: &TreeItem) -> bool {
        match self {
            Self::Menu => item.inmenu,
            Self::Breadcrumbs => item.inbreadcrumbs,
            Self::Sitetree => item.insitetree,
        }
    }
}

impl fmt::Display for NavType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NavType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(Self::Menu),
            "breadcrumbs" => Ok(Self::Breadcrumbs),
            "sitetree" => Ok(Self::Sitetree),
            other => Err(format!("unknown navigation type `{other}`")),
        }
    }
}

/// A node of a resolved navigation tree.
///
/// Stored fields mirror [`ItemRecord`]. Structural fields (`depth`, `perms`)
/// are computed when the tree is built and cached with it. Contextual fields
/// (`is_current`, `in_current_branch`, `has_children`, `url_resolved`,
/// `title_resolved`) depend on the request and are recomputed every time a
/// tree is resolved; they are never cached.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    /// Item id. Items attached from dynamic trees get negative ids.
    pub id: i64,
    /// Alias of the tree the item was resolved in.
    pub tree: String,
    /// Parent item id; `None` for root items.
    pub parent: Option<i64>,
    /// Raw title, possibly with `{{ var }}` references.
    pub title: String,
    /// Hint, usually shown as a tooltip.
    pub hint: String,
    /// Literal URL, or `"pattern arg..."` when `urlaspattern` is set.
    pub url: String,
    /// Whether `url` is a named route with arguments.
    pub urlaspattern: bool,
    /// Alias unique within the tree.
    pub alias: Option<String>,
    /// Free-form description.
    pub description: String,
    /// Sibling order.
    pub sort_order: i64,
    /// Hidden from every channel.
    pub hidden: bool,
    /// Shown in menus.
    pub inmenu: bool,
    /// Shown in breadcrumbs.
    pub inbreadcrumbs: bool,
    /// Shown in site trees.
    pub insitetree: bool,
    /// Only for authenticated users.
    pub access_loggedin: bool,
    /// Only for anonymous users.
    pub access_guest: bool,
    /// Gated by `perms`.
    pub access_restricted: bool,
    /// Permissions attached to the item.
    pub access_permissions: Vec<Permission>,
    /// How `perms` is matched against the user's permissions.
    pub access_perm_type: PermType,

    /// Item comes from a dynamic tree.
    #[serde(default)]
    pub is_dynamic: bool,
    /// Extra attributes declared on a dynamic item.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub dynamic_attrs: Map<String, Value>,
    /// Name of a registered access check consulted before the standard ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_check: Option<String>,

    /// Distance from a root item.
    #[serde(default)]
    pub depth: usize,
    /// Qualified permission names (`app.codename`), set for restricted items.
    #[serde(default)]
    pub perms: BTreeSet<String>,

    /// Has at least one child visible in the current channel.
    #[serde(skip)]
    pub has_children: bool,
    /// URL matches the current request path.
    #[serde(skip)]
    pub is_current: bool,
    /// Item is the current item or one of its ancestors.
    #[serde(skip)]
    pub in_current_branch: bool,
    /// URL after pattern resolution.
    #[serde(skip)]
    pub url_resolved: String,
    /// Title after variable substitution.
    #[serde(skip)]
    pub title_resolved: String,
}

impl TreeItem {
    /// Read a named attribute as text.
    ///
    /// Built-in attributes are `id`, `title`, `title_resolved`, `url`,
    /// `url_resolved`, `alias`, `hint`, `description` and `depth`. Any other
    /// name is looked up in [`dynamic_attrs`](Self::dynamic_attrs).
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<String> {
        let value = match name {
            "id" => self.id.to_string(),
            "title" => self.title.clone(),
            "title_resolved" => self.title_resolved.clone(),
            "url" => self.url.clone(),
            "url_resolved" => self.url_resolved.clone(),
            "alias" => self.alias.clone().unwrap_or_default(),
            "hint" => self.hint.clone(),
            "description" => self.description.clone(),
            "depth" => self.depth.to_string(),
            _ => {
                return self.dynamic_attrs.get(name).map(|value| match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                });
            }
        };
        Some(value)
    }
}

impl From<ItemRecord> for TreeItem {
    fn from(record: ItemRecord) -> Self {
        Self {
            id: record.id,
            tree: record.tree,
            parent: record.parent,
            title: record.title,
            hint: record.hint,
            url: record.url,
            urlaspattern: record.urlaspattern,
            alias: record.alias,
            description: record.description,
            sort_order: record.sort_order,
            hidden: record.hidden,
            inmenu: record.inmenu,
            inbreadcrumbs: record.inbreadcrumbs,
            insitetree: record.insitetree,
            access_loggedin: record.access_loggedin,
            access_guest: record.access_guest,
            access_restricted: record.access_restricted,
            access_permissions: record.access_permissions,
            access_perm_type: record.access_perm_type,
            ..Self::default()
        }
    }
}
