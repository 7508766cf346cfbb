//! Per-request tree resolution.
//!
//! A [`Resolver`] answers the navigation queries of one page render. It loads
//! trees through the structural cache, resolves URLs and titles against the
//! page context, determines the current item and applies visibility and
//! access rules.
//!
//! Everything it memoizes (resolved URLs, current items, the user's
//! permissions, rendered titles) lives as long as the resolver, so nothing
//! computed for one request leaks into another.

use std::cell::{OnceCell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use navtree_storage::{PermType, Storage};

use crate::context::PageContext;
use crate::error::NavError;
use crate::model::{NavType, TreeItem};
use crate::navigator::NavigatorConfig;
use crate::registry::NavRegistry;
use crate::title::TitleCache;
use crate::tree_cache::TreeCache;
use crate::tree_state::TreeState;
use crate::url::{UrlReverser, iri_to_uri};

const TRUNK: &str = "trunk";
const THIS_CHILDREN: &str = "this-children";
const THIS_SIBLINGS: &str = "this-siblings";
const THIS_ANCESTOR_CHILDREN: &str = "this-ancestor-children";
const THIS_PARENT_SIBLINGS: &str = "this-parent-siblings";

/// Resolves navigation for one page render.
///
/// Obtained from [`Navigator::resolver`](crate::Navigator::resolver). Tree
/// aliases and branch specs may be literals or names of page variables.
///
/// Query methods return owned items; each call reflects the state of the
/// tree at that point of the render.
pub struct Resolver<'a> {
    storage: &'a dyn Storage,
    reverser: &'a dyn UrlReverser,
    config: &'a NavigatorConfig,
    ctx: &'a PageContext,
    registry: Arc<NavRegistry>,
    cache: TreeCache,
    trees: HashMap<String, TreeState>,
    urls: RefCell<HashMap<(String, i64, String), String>>,
    current: HashMap<String, i64>,
    user_perms: OnceCell<BTreeSet<String>>,
    titles: TitleCache,
    admin: bool,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(
        storage: &'a dyn Storage,
        reverser: &'a dyn UrlReverser,
        config: &'a NavigatorConfig,
        ctx: &'a PageContext,
        registry: Arc<NavRegistry>,
        cache: TreeCache,
    ) -> Self {
        let admin = !ctx.current_app().is_empty() && ctx.current_app() == config.admin_app_name;
        Self {
            storage,
            reverser,
            config,
            ctx,
            registry,
            cache,
            trees: HashMap::new(),
            urls: RefCell::new(HashMap::new()),
            current: HashMap::new(),
            user_perms: OnceCell::new(),
            titles: TitleCache::default(),
            admin,
        }
    }

    /// Page context this resolver renders for.
    #[must_use]
    pub fn context(&self) -> &PageContext {
        self.ctx
    }

    /// Registry snapshot taken when the resolver was created.
    #[must_use]
    pub fn registry(&self) -> &NavRegistry {
        &self.registry
    }

    /// Whether the page is rendered by the admin application.
    ///
    /// Admin rendering disables filtering, current item matching and i18n
    /// substitution.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Load a tree and return its resolved alias and items.
    ///
    /// The alias is replaced by its `{alias}_{language}` variant when the tree
    /// is registered as i18n-capable and the variant exists. Items carry
    /// resolved URLs and titles, and `is_current` marks the items matching the
    /// request path.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Storage`] if the tree cannot be read.
    pub fn get_tree(&mut self, alias: &str) -> Result<(String, Vec<TreeItem>), NavError> {
        let alias = self.load_tree(alias)?;
        let items = self
            .trees
            .get(&alias)
            .map(|state| state.items().to_vec())
            .unwrap_or_default();
        Ok((alias, items))
    }

    fn resolve_i18n_alias(&mut self, alias: &str) -> Result<String, NavError> {
        if self.admin || !self.registry.is_i18n_tree(alias) || self.ctx.language.is_empty() {
            return Ok(alias.to_owned());
        }

        let candidate = format!("{alias}_{}", self.ctx.language);
        let exists = match self.cache.tree_exists(&candidate) {
            Some(exists) => exists,
            None => {
                let exists = self.tree_exists(&candidate)?;
                tracing::debug!(alias = %candidate, exists, "Probed i18n tree");
                self.cache.set_tree_exists(&candidate, exists);
                self.cache.save();
                exists
            }
        };

        Ok(if exists { candidate } else { alias.to_owned() })
    }

    fn tree_exists(&self, alias: &str) -> Result<bool, NavError> {
        if self.registry.has_orphan_tree(alias) {
            return Ok(true);
        }
        if self.config.dynamic_only {
            return Ok(false);
        }
        Ok(self.storage.count_trees(alias)? > 0)
    }

    /// Build the structure of a tree, from the cache if possible.
    fn build_tree(&mut self, alias: &str) -> Result<TreeState, NavError> {
        if let Some(items) = self.cache.tree_items(alias) {
            tracing::debug!(tree = alias, "Tree cache hit");
            return Ok(TreeState::build(items.to_vec()));
        }

        tracing::debug!(tree = alias, "Tree cache miss, rebuilding");
        let stored = if self.config.dynamic_only {
            Vec::new()
        } else {
            self.storage
                .tree_items(alias)?
                .into_iter()
                .map(TreeItem::from)
                .collect()
        };

        let state = TreeState::build(self.registry.merge(alias, stored));
        self.cache.set_tree_items(alias, state.items().to_vec());
        self.cache.save();
        Ok(state)
    }

    /// Load `alias` and refresh its contextual fields. Returns the resolved alias.
    fn load_tree(&mut self, alias: &str) -> Result<String, NavError> {
        let alias = self.resolve_i18n_alias(alias)?;

        let mut state = match self.trees.remove(&alias) {
            Some(state) => state,
            None => self.build_tree(&alias)?,
        };

        for item in state.items_mut() {
            item.url_resolved = self.url(item);
            item.title_resolved = self.titles.render(&item.title, self.ctx);
            item.is_current = false;
            item.in_current_branch = false;
        }

        self.trees.insert(alias.clone(), state);
        self.current_item_id(&alias);
        Ok(alias)
    }

    /// Mark items matching the request path and pick the current item of `alias`.
    ///
    /// Matching items of every loaded tree are marked `is_current`. Within
    /// `alias` the first match in tree order is the current item.
    fn current_item_id(&mut self, alias: &str) -> Option<i64> {
        if self.admin {
            return None;
        }
        let path = iri_to_uri(self.ctx.path()?);

        let mut matches = Vec::new();
        for (tree_alias, state) in &mut self.trees {
            for item in state.items_mut().iter_mut().filter(|i| i.url_resolved == path) {
                item.is_current = true;
                if tree_alias == alias {
                    matches.push(item.id);
                }
            }
        }

        if let Some(&id) = self.current.get(alias) {
            return Some(id);
        }

        let current = matches.first().copied()?;
        if matches.len() > 1 {
            tracing::warn!(
                tree = alias,
                path = %path,
                items = ?matches,
                "Several items match the current path, using the first"
            );
        }
        self.current.insert(alias.to_owned(), current);
        Some(current)
    }

    /// Mark the current item and its ancestors as the current branch.
    fn mark_current_branch(&mut self, alias: &str, current: Option<i64>) {
        let (Some(id), Some(state)) = (current, self.trees.get_mut(alias)) else {
            return;
        };
        for ancestor in state.ancestry(id) {
            if let Some(item) = state.get_mut(ancestor) {
                item.in_current_branch = true;
            }
        }
    }

    /// Current item of a tree, if one matches the request path.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if no request is bound, and
    /// [`NavError::Storage`] if the tree cannot be read.
    pub fn current_item(&mut self, alias: &str) -> Result<Option<TreeItem>, NavError> {
        let Some(alias) = self.init_tree(alias)? else {
            return Ok(None);
        };
        let current = self.current_item_id(&alias);
        Ok(current.and_then(|id| self.trees.get(&alias)?.get(id).cloned()))
    }

    /// Resolve the URL of an item.
    ///
    /// Literal URLs are returned as is. Pattern URLs (`"name arg1 arg2"`) are
    /// reversed with arguments resolved against the page variables; patterns
    /// that cannot be reversed yield the unresolved marker. Results are
    /// memoized per item and raw URL for the life of the resolver.
    pub fn url(&self, item: &TreeItem) -> String {
        let key = (item.tree.clone(), item.id, item.url.clone());
        if let Some(url) = self.urls.borrow().get(&key) {
            return url.clone();
        }
        let url = self.resolve_url(item);
        self.urls.borrow_mut().insert(key, url.clone());
        url
    }

    fn resolve_url(&self, item: &TreeItem) -> String {
        if !item.urlaspattern {
            return item.url.clone();
        }

        let mut tokens = item.url.split_whitespace();
        let name = tokens
            .next()
            .unwrap_or_default()
            .trim_matches(|c| matches!(c, '"' | '\'' | ' '));
        let args: Vec<String> = tokens.map(|token| self.ctx.resolve_token(token)).collect();

        if let Some(url) = self.reverser.reverse(name, &args, self.ctx.current_app()) {
            return url;
        }
        tracing::warn!(
            tree = %item.tree,
            item = item.id,
            pattern = %item.url,
            "Unable to resolve URL pattern"
        );
        self.config.unresolved_marker.clone()
    }

    /// Whether the page's user may see an item.
    ///
    /// A registered access check named by the item decides first. Then
    /// `access_loggedin` and `access_guest` are checked against the user, and
    /// restricted items require all (or any, per `access_perm_type`) of their
    /// permissions.
    pub fn check_access(&self, item: &TreeItem) -> bool {
        if let Some(name) = &item.access_check {
            match self.registry.access_check(name) {
                Some(check) => {
                    if let Some(decision) = check.check(item, self.ctx) {
                        return decision;
                    }
                }
                None => {
                    tracing::warn!(check = %name, item = item.id, "Unknown access check");
                }
            }
        }

        let user = self.ctx.user();
        let authenticated = user.is_authenticated();
        if (item.access_loggedin && !authenticated) || (item.access_guest && authenticated) {
            return false;
        }

        if !item.access_restricted {
            return true;
        }
        let user_perms = self.user_perms.get_or_init(|| user.permissions());
        match item.access_perm_type {
            PermType::All => item.perms.is_subset(user_perms),
            PermType::Any => !item.perms.is_disjoint(user_perms),
        }
    }

    /// Keep the items that are visible in `nav` and accessible to the user.
    ///
    /// Admin rendering keeps everything.
    pub fn filter_items<'i>(
        &self,
        items: impl IntoIterator<Item = &'i TreeItem>,
        nav: NavType,
    ) -> Vec<TreeItem> {
        items
            .into_iter()
            .filter(|item| self.admin || (!item.hidden && self.check_access(item) && nav.shows(item)))
            .cloned()
            .collect()
    }

    fn apply_hook(&self, items: Vec<TreeItem>, sender: &str) -> Result<Vec<TreeItem>, NavError> {
        match self.registry.items_hook() {
            Some(hook) => hook.apply(items, sender, self.ctx),
            None => Ok(items),
        }
    }

    fn update_has_children(
        &self,
        alias: &str,
        items: &mut [TreeItem],
        nav: NavType,
    ) -> Result<(), NavError> {
        let Some(state) = self.trees.get(alias) else {
            return Ok(());
        };
        let sender = format!("{nav}.has_children");
        for item in items {
            let children = self.filter_items(state.children(item.id), nav);
            item.has_children = !self.apply_hook(children, &sender)?.is_empty();
        }
        Ok(())
    }

    /// Resolve the tree alias and load it; `None` when there is nothing to render.
    fn init_tree(&mut self, alias: &str) -> Result<Option<String>, NavError> {
        if self.ctx.request.is_none() {
            if self.ctx.handling_error {
                tracing::warn!(tree = alias, "No request bound while handling an error, skipping tree");
                return Ok(None);
            }
            return Err(NavError::Configuration(format!(
                "tree `{alias}` requires a request bound to the page context"
            )));
        }

        let alias = self.ctx.resolve_token(alias);
        let alias = self.load_tree(&alias)?;
        if self.trees.get(&alias).is_none_or(TreeState::is_empty) {
            return Ok(None);
        }
        Ok(Some(alias))
    }

    /// Menu items under the given branches.
    ///
    /// `branches` is a comma-separated list of parent references: `trunk`
    /// for root items, an item id, an item alias, or one of `this-children`,
    /// `this-siblings`, `this-ancestor-children` and `this-parent-siblings`,
    /// relative to the current item. Items keep their tree order.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if no request is bound,
    /// [`NavError::Storage`] if the tree cannot be read and
    /// [`NavError::Hook`] if the items hook fails.
    pub fn menu(&mut self, alias: &str, branches: &str) -> Result<Vec<TreeItem>, NavError> {
        let Some(alias) = self.init_tree(alias)? else {
            return Ok(Vec::new());
        };
        let branches = self.ctx.resolve_token(branches);

        let current = self.current_item_id(&alias);
        self.mark_current_branch(&alias, current);

        let Some(state) = self.trees.get(&alias) else {
            return Ok(Vec::new());
        };

        let mut trunk = false;
        let mut parent_ids = Vec::new();
        let mut parent_aliases = Vec::new();
        for token in branches.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token {
                TRUNK => trunk = true,
                THIS_CHILDREN => parent_ids.extend(current),
                THIS_SIBLINGS => {
                    parent_ids.extend(current.and_then(|id| state.parent(id)).map(|p| p.id));
                }
                THIS_ANCESTOR_CHILDREN => {
                    parent_ids.extend(current.and_then(|id| state.ancestry(id).last().copied()));
                }
                THIS_PARENT_SIBLINGS => {
                    parent_ids.extend(current.and_then(|id| {
                        let chain = state.ancestry(id);
                        chain.get(2).or(chain.last()).copied()
                    }));
                }
                other => {
                    if other.bytes().all(|b| b.is_ascii_digit())
                        && let Ok(id) = other.parse::<i64>()
                    {
                        parent_ids.push(id);
                    } else {
                        parent_aliases.push(other);
                    }
                }
            }
        }

        let items: Vec<TreeItem> = state
            .items()
            .iter()
            .filter(|item| match state.parent(item.id) {
                None => trunk,
                Some(parent) => {
                    parent_ids.contains(&parent.id)
                        || parent
                            .alias
                            .as_deref()
                            .is_some_and(|a| parent_aliases.contains(&a))
                }
            })
            .filter(|item| !item.hidden && item.inmenu && self.check_access(item))
            .cloned()
            .collect();

        let mut items = self.apply_hook(items, NavType::Menu.as_str())?;
        self.update_has_children(&alias, &mut items, NavType::Menu)?;
        Ok(items)
    }

    /// Breadcrumb trail from the root to the current item.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if no request is bound,
    /// [`NavError::Storage`] if the tree cannot be read and
    /// [`NavError::Hook`] if the items hook fails.
    pub fn breadcrumbs(&mut self, alias: &str) -> Result<Vec<TreeItem>, NavError> {
        let Some(alias) = self.init_tree(alias)? else {
            return Ok(Vec::new());
        };
        let current = self.current_item_id(&alias);

        let mut crumbs = Vec::new();
        if let (Some(id), Some(state)) = (current, self.trees.get(&alias)) {
            crumbs = state
                .ancestry(id)
                .into_iter()
                .filter_map(|id| state.get(id))
                .filter(|item| item.inbreadcrumbs && !item.hidden && self.check_access(item))
                .cloned()
                .collect();
            crumbs.reverse();
        }

        let mut items = self.apply_hook(crumbs, NavType::Breadcrumbs.as_str())?;
        self.update_has_children(&alias, &mut items, NavType::Breadcrumbs)?;
        Ok(items)
    }

    /// Root items of a tree for a site map.
    ///
    /// Descend with [`children`](Self::children).
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Configuration`] if no request is bound,
    /// [`NavError::Storage`] if the tree cannot be read and
    /// [`NavError::Hook`] if the items hook fails.
    pub fn tree(&mut self, alias: &str) -> Result<Vec<TreeItem>, NavError> {
        let Some(alias) = self.init_tree(alias)? else {
            return Ok(Vec::new());
        };
        let items = match self.trees.get(&alias) {
            Some(state) => self.filter_items(state.roots(), NavType::Sitetree),
            None => Vec::new(),
        };

        let mut items = self.apply_hook(items, NavType::Sitetree.as_str())?;
        self.update_has_children(&alias, &mut items, NavType::Sitetree)?;
        Ok(items)
    }

    /// Visible children of an item previously returned by this resolver.
    ///
    /// Only items are returned; rendering them is up to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Storage`] if the tree cannot be read and
    /// [`NavError::Hook`] if the items hook fails.
    pub fn children(&mut self, parent: &TreeItem, nav: NavType) -> Result<Vec<TreeItem>, NavError> {
        let alias = self.load_tree(&parent.tree)?;
        let current = self.current_item_id(&alias);
        self.mark_current_branch(&alias, current);

        let items = match self.trees.get(&alias) {
            Some(state) => self.filter_items(state.children(parent.id), nav),
            None => Vec::new(),
        };

        let mut items = self.apply_hook(items, &format!("{nav}.children"))?;
        self.update_has_children(&alias, &mut items, nav)?;
        Ok(items)
    }

    /// Resolved title of the current page.
    ///
    /// # Errors
    ///
    /// See [`get_current_page_attr`](Self::get_current_page_attr).
    pub fn get_current_page_title(&mut self, alias: &str) -> Result<String, NavError> {
        self.get_current_page_attr("title_resolved", alias)
    }

    /// An attribute of the current page's item, empty when there is none.
    ///
    /// Built-in attributes and the attributes of dynamic items are supported
    /// (see [`TreeItem::attr`]).
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Resolution`] in strict mode when no item matches
    /// the request path, [`NavError::Configuration`] if no request is bound and
    /// [`NavError::Storage`] if the tree cannot be read.
    pub fn get_current_page_attr(&mut self, attr: &str, alias: &str) -> Result<String, NavError> {
        let current = match self.init_tree(alias)? {
            Some(alias) => self
                .current_item_id(&alias)
                .and_then(|id| self.trees.get(&alias)?.get(id)),
            // No request while handling another error
            None if self.ctx.request.is_none() => return Ok(String::new()),
            None => None,
        };

        match current {
            Some(item) => Ok(item.attr(attr).unwrap_or_default()),
            None if self.config.strict() => Err(NavError::Resolution {
                attr: attr.to_owned(),
                path: self.ctx.path().unwrap_or_default().to_owned(),
            }),
            None => Ok(String::new()),
        }
    }

    pub(crate) fn item_choices(&mut self, alias: &str) -> Result<Vec<(String, String)>, NavError> {
        let alias = self.load_tree(alias)?;
        let mut choices = vec![(
            self.config.items_field_root_id.clone(),
            self.config.root_title.clone(),
        )];
        let Some(state) = self.trees.get(&alias) else {
            return Ok(choices);
        };

        let mut stack: Vec<&TreeItem> = state.roots().collect();
        stack.reverse();
        while let Some(item) = stack.pop() {
            choices.push((
                item.id.to_string(),
                format!("{}{}", "|--- ".repeat(item.depth), item.title_resolved),
            ));
            let first = stack.len();
            stack.extend(state.children(item.id));
            stack[first..].reverse();
        }
        Ok(choices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Request, User};
    use crate::navigator::Navigator;
    use crate::registry::{compose, item, tree};
    use crate::url::RouteTable;
    use navtree_cache::{CacheStore, MemoryStore};
    use navtree_storage::{ItemRecord, MemoryStorage, Permission};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// main
    /// ├── Home        /          (alias home)
    /// │   ├── About   /about/    (alias about)
    /// │   │   └── Team /about/team/
    /// │   └── Contact /contact/
    /// └── Products    product_list (pattern)
    ///     └── Detail  product_detail id (pattern)
    struct Fixture {
        storage: Arc<MemoryStorage>,
        store: Arc<MemoryStore>,
        navigator: Navigator,
    }

    fn routes() -> RouteTable {
        RouteTable::new()
            .route("product_list", "/products/")
            .route("product_detail", "/products/<id>/")
    }

    fn fixture_with(config: NavigatorConfig) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        storage.save_tree("main", "Main").unwrap();
        let home = storage
            .save_item(ItemRecord::new("main", "Home", "/").with_alias("home"))
            .unwrap();
        let about = storage
            .save_item(
                ItemRecord::new("main", "About", "/about/")
                    .with_parent(home)
                    .with_alias("about"),
            )
            .unwrap();
        storage
            .save_item(ItemRecord::new("main", "Team", "/about/team/").with_parent(about))
            .unwrap();
        storage
            .save_item(ItemRecord::new("main", "Contact", "/contact/").with_parent(home))
            .unwrap();
        let products = storage
            .save_item(ItemRecord {
                urlaspattern: true,
                ..ItemRecord::new("main", "Products", "product_list")
            })
            .unwrap();
        storage
            .save_item(ItemRecord {
                urlaspattern: true,
                ..ItemRecord::new("main", "Product {{ product.name }}", "product_detail id")
                    .with_parent(products)
            })
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        let navigator = Navigator::new(
            Arc::clone(&storage) as Arc<dyn Storage>,
            Arc::clone(&store) as Arc<dyn CacheStore>,
            Arc::new(routes()),
            config,
        )
        .unwrap();
        Fixture {
            storage,
            store,
            navigator,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(NavigatorConfig::default())
    }

    fn page(path: &str) -> PageContext {
        PageContext::new(Request::new(path))
    }

    fn titles(items: &[TreeItem]) -> Vec<&str> {
        items.iter().map(|i| i.title.as_str()).collect()
    }

    fn restricted(perm_type: PermType, perms: &[&Permission]) -> impl FnOnce(ItemRecord) -> ItemRecord {
        let perms: Vec<Permission> = perms.iter().map(|p| (*p).clone()).collect();
        move |record| ItemRecord {
            access_restricted: true,
            access_permissions: perms,
            access_perm_type: perm_type,
            ..record
        }
    }

    #[test]
    fn test_depth_matches_parent_chain() {
        let fx = fixture();
        let ctx = page("/");
        let (_, items) = fx.navigator.resolver(&ctx).get_tree("main").unwrap();

        let by_id: HashMap<i64, &TreeItem> = items.iter().map(|i| (i.id, i)).collect();
        for item in &items {
            match item.parent {
                None => assert_eq!(item.depth, 0),
                Some(parent) => assert_eq!(item.depth, by_id[&parent].depth + 1),
            }
        }
        assert_eq!(by_id[&3].depth, 2);
    }

    #[test]
    fn test_siblings_ordered_by_id_when_unsorted() {
        let fx = fixture();
        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);

        let roots = resolver.tree("main").unwrap();
        assert_eq!(titles(&roots), vec!["Home", "Products"]);
        let children = resolver.children(&roots[0], NavType::Sitetree).unwrap();
        assert_eq!(titles(&children), vec!["About", "Contact"]);
    }

    #[test]
    fn test_get_tree_is_idempotent_within_request() {
        let fx = fixture();
        let ctx = page("/about/");
        let mut resolver = fx.navigator.resolver(&ctx);

        let (alias_a, first) = resolver.get_tree("main").unwrap();
        let (alias_b, second) = resolver.get_tree("main").unwrap();

        assert_eq!(alias_a, alias_b);
        let summary = |items: &[TreeItem]| {
            items
                .iter()
                .map(|i| (i.id, i.depth, i.has_children, i.is_current))
                .collect::<Vec<_>>()
        };
        assert_eq!(summary(&first), summary(&second));
    }

    #[test]
    fn test_cached_tree_matches_fresh_build() {
        let fx = fixture();
        let ctx = page("/about/");
        let (_, fresh) = fx.navigator.resolver(&ctx).get_tree("main").unwrap();
        let (_, cached) = fx.navigator.resolver(&ctx).get_tree("main").unwrap();

        assert_eq!(fresh, cached);
    }

    #[test]
    fn test_menu_trunk_marks_current() {
        let fx = fixture();
        let ctx = page("/");
        let menu = fx.navigator.resolver(&ctx).menu("main", "trunk").unwrap();

        assert_eq!(titles(&menu), vec!["Home", "Products"]);
        assert!(menu[0].is_current);
        assert!(!menu[1].is_current);
        assert!(menu[0].has_children);
        assert!(menu[1].has_children);
    }

    #[test]
    fn test_menu_branch_tokens() {
        let fx = fixture();
        let ctx = page("/about/team/");
        let mut resolver = fx.navigator.resolver(&ctx);

        assert_eq!(titles(&resolver.menu("main", "home").unwrap()), vec!["About", "Contact"]);
        assert_eq!(titles(&resolver.menu("main", "1").unwrap()), vec!["About", "Contact"]);
        assert_eq!(titles(&resolver.menu("main", "this-children").unwrap()), Vec::<&str>::new());
        assert_eq!(titles(&resolver.menu("main", "this-siblings").unwrap()), vec!["Team"]);
        assert_eq!(
            titles(&resolver.menu("main", "this-ancestor-children").unwrap()),
            vec!["About", "Contact"]
        );
        assert_eq!(
            titles(&resolver.menu("main", "this-parent-siblings").unwrap()),
            vec!["About", "Contact"]
        );
        assert_eq!(
            titles(&resolver.menu("main", "trunk, about").unwrap()),
            vec!["Home", "Products", "Team"]
        );
    }

    #[test]
    fn test_menu_branch_from_variable() {
        let fx = fixture();
        let ctx = page("/").with_var("branch", "home");

        let menu = fx.navigator.resolver(&ctx).menu("main", "branch").unwrap();

        assert_eq!(titles(&menu), vec!["About", "Contact"]);
    }

    #[test]
    fn test_menu_marks_current_branch() {
        let fx = fixture();
        let ctx = page("/about/team/");
        let menu = fx.navigator.resolver(&ctx).menu("main", "trunk").unwrap();

        assert!(menu[0].in_current_branch);
        assert!(!menu[0].is_current);
        assert!(!menu[1].in_current_branch);
    }

    #[test]
    fn test_this_parent_siblings_near_root() {
        let fx = fixture();
        let ctx = page("/about/");
        let menu = fx
            .navigator
            .resolver(&ctx)
            .menu("main", "this-parent-siblings")
            .unwrap();

        // The grandparent is missing, so the parent's children are used
        assert_eq!(titles(&menu), vec!["About", "Contact"]);
    }

    #[test]
    fn test_breadcrumbs_root_to_current() {
        let fx = fixture();
        let ctx = page("/about/team/");
        let crumbs = fx.navigator.resolver(&ctx).breadcrumbs("main").unwrap();

        assert_eq!(titles(&crumbs), vec!["Home", "About", "Team"]);
    }

    #[test]
    fn test_breadcrumbs_skip_ineligible_items() {
        let fx = fixture();
        let mut about = fx.storage.dump(&["main".to_owned()], true).items[1].clone();
        assert_eq!(about.title, "About");
        about.inbreadcrumbs = false;
        fx.storage.save_item(about).unwrap();

        let ctx = page("/about/team/");
        let crumbs = fx.navigator.resolver(&ctx).breadcrumbs("main").unwrap();

        assert_eq!(titles(&crumbs), vec!["Home", "Team"]);
    }

    #[test]
    fn test_breadcrumbs_empty_without_current_item() {
        let fx = fixture();
        let ctx = page("/nowhere/");

        assert!(fx.navigator.resolver(&ctx).breadcrumbs("main").unwrap().is_empty());
    }

    #[test]
    fn test_pattern_url_resolved_with_variables() {
        let fx = fixture();
        let ctx = page("/products/42/").with_var("id", 42).with_var("product", json!({"name": "Teapot"}));
        let mut resolver = fx.navigator.resolver(&ctx);

        let current = resolver.current_item("main").unwrap().unwrap();

        assert_eq!(current.url_resolved, "/products/42/");
        assert_eq!(current.title_resolved, "Product Teapot");
        assert_eq!(resolver.get_current_page_title("main").unwrap(), "Product Teapot");
    }

    #[test]
    fn test_unresolvable_pattern_gets_marker() {
        let fx = fixture();
        // `id` is not bound, so the literal token is passed and the route still matches
        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);
        let (_, items) = resolver.get_tree("main").unwrap();
        let detail = items.iter().find(|i| i.url == "product_detail id").unwrap();
        assert_eq!(detail.url_resolved, "/products/id/");

        let broken = TreeItem {
            id: 99,
            tree: "main".to_owned(),
            url: "missing_route 1".to_owned(),
            urlaspattern: true,
            ..TreeItem::default()
        };
        assert_eq!(resolver.url(&broken), "#unresolved");
    }

    #[test]
    fn test_url_cache_is_per_request() {
        let fx = fixture();
        let first = page("/").with_var("id", 1);
        let second = page("/").with_var("id", 2);

        let url_of = |ctx: &PageContext| {
            let (_, items) = fx.navigator.resolver(ctx).get_tree("main").unwrap();
            items
                .into_iter()
                .find(|i| i.url == "product_detail id")
                .unwrap()
                .url_resolved
        };

        assert_eq!(url_of(&first), "/products/1/");
        assert_eq!(url_of(&second), "/products/2/");
    }

    #[test]
    fn test_quoted_pattern_name_and_literal_args() {
        let fx = fixture();
        let ctx = page("/");
        let resolver = fx.navigator.resolver(&ctx);
        let item = TreeItem {
            id: 50,
            tree: "main".to_owned(),
            url: "'product_detail' \"special\"".to_owned(),
            urlaspattern: true,
            ..TreeItem::default()
        };

        assert_eq!(resolver.url(&item), "/products/special/");
    }

    #[test]
    fn test_access_all_requires_every_permission() {
        let fx = fixture();
        let view = fx.storage.save_permission("shop", "view").unwrap();
        let edit = fx.storage.save_permission("shop", "edit").unwrap();
        fx.storage
            .save_item(restricted(PermType::All, &[&view, &edit])(ItemRecord::new(
                "main", "Orders", "/orders/",
            )))
            .unwrap();

        let visible_to = |user: User| {
            let ctx = PageContext::new(Request::new("/").with_user(user));
            titles(&fx.navigator.resolver(&ctx).tree("main").unwrap()).contains(&"Orders")
        };

        assert!(visible_to(User::authenticated("ann", ["shop.view", "shop.edit"])));
        assert!(!visible_to(User::authenticated("bob", ["shop.view"])));
        assert!(!visible_to(User::Anonymous));
    }

    #[test]
    fn test_access_any_requires_one_permission() {
        let fx = fixture();
        let view = fx.storage.save_permission("shop", "view").unwrap();
        let edit = fx.storage.save_permission("shop", "edit").unwrap();
        fx.storage
            .save_item(restricted(PermType::Any, &[&view, &edit])(ItemRecord::new(
                "main", "Orders", "/orders/",
            )))
            .unwrap();

        let visible_to = |user: User| {
            let ctx = PageContext::new(Request::new("/").with_user(user));
            titles(&fx.navigator.resolver(&ctx).tree("main").unwrap()).contains(&"Orders")
        };

        assert!(visible_to(User::authenticated("bob", ["shop.edit"])));
        assert!(!visible_to(User::authenticated("eve", ["blog.view"])));
    }

    #[test]
    fn test_loggedin_and_guest_items() {
        let fx = fixture();
        fx.storage
            .save_item(ItemRecord {
                access_loggedin: true,
                ..ItemRecord::new("main", "Account", "/account/")
            })
            .unwrap();
        fx.storage
            .save_item(ItemRecord {
                access_guest: true,
                ..ItemRecord::new("main", "Login", "/login/")
            })
            .unwrap();

        let anonymous = page("/");
        let member = PageContext::new(
            Request::new("/").with_user(User::authenticated("ann", Vec::<String>::new())),
        );

        assert_eq!(
            titles(&fx.navigator.resolver(&anonymous).tree("main").unwrap()),
            vec!["Home", "Products", "Login"]
        );
        assert_eq!(
            titles(&fx.navigator.resolver(&member).tree("main").unwrap()),
            vec!["Home", "Products", "Account"]
        );
    }

    #[test]
    fn test_hidden_and_channel_flags() {
        let fx = fixture();
        fx.storage
            .save_item(ItemRecord {
                hidden: true,
                ..ItemRecord::new("main", "Hidden", "/hidden/")
            })
            .unwrap();
        fx.storage
            .save_item(ItemRecord {
                inmenu: false,
                ..ItemRecord::new("main", "Sitemap only", "/map/")
            })
            .unwrap();

        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);

        assert_eq!(
            titles(&resolver.menu("main", "trunk").unwrap()),
            vec!["Home", "Products"]
        );
        assert_eq!(
            titles(&resolver.tree("main").unwrap()),
            vec!["Home", "Products", "Sitemap only"]
        );
    }

    #[test]
    fn test_has_children_respects_channel() {
        let fx = fixture();
        let mut team = fx.storage.dump(&["main".to_owned()], true).items[2].clone();
        assert_eq!(team.title, "Team");
        team.inmenu = false;
        fx.storage.save_item(team).unwrap();

        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);

        let menu = resolver.menu("main", "home").unwrap();
        assert_eq!(titles(&menu), vec!["About", "Contact"]);
        assert!(!menu[0].has_children);

        let roots = resolver.tree("main").unwrap();
        let sitemap = resolver.children(&roots[0], NavType::Sitetree).unwrap();
        assert!(sitemap[0].has_children);
    }

    #[test]
    fn test_i18n_variant_substituted() {
        let fx = fixture();
        fx.storage.save_tree("main_en", "Main (en)").unwrap();
        fx.storage
            .save_item(ItemRecord::new("main_en", "Start", "/"))
            .unwrap();
        fx.navigator.register_i18n_trees(["main"]);

        let english = page("/").with_language("en");
        let (alias, items) = fx.navigator.resolver(&english).get_tree("main").unwrap();
        assert_eq!(alias, "main_en");
        assert_eq!(titles(&items), vec!["Start"]);

        let german = page("/").with_language("de");
        let (alias, _) = fx.navigator.resolver(&german).get_tree("main").unwrap();
        assert_eq!(alias, "main");
    }

    #[test]
    fn test_i18n_ignored_for_unregistered_trees() {
        let fx = fixture();
        fx.storage.save_tree("main_en", "").unwrap();
        fx.storage.save_item(ItemRecord::new("main_en", "Start", "/")).unwrap();

        let ctx = page("/").with_language("en");
        let (alias, _) = fx.navigator.resolver(&ctx).get_tree("main").unwrap();

        assert_eq!(alias, "main");
    }

    #[test]
    fn test_tree_alias_from_variable() {
        let fx = fixture();
        let ctx = page("/").with_var("nav", "main");

        assert_eq!(fx.navigator.resolver(&ctx).tree("nav").unwrap().len(), 2);
        assert!(fx.navigator.resolver(&ctx).tree("\"nav\"").unwrap().is_empty());
    }

    #[test]
    fn test_missing_request_is_configuration_error() {
        let fx = fixture();
        let ctx = PageContext::default();

        let err = fx.navigator.resolver(&ctx).menu("main", "trunk").unwrap_err();

        assert!(matches!(err, NavError::Configuration(_)));
    }

    #[test]
    fn test_missing_request_while_handling_error_is_silent() {
        let fx = fixture();
        let ctx = PageContext::default().handling_error(true);
        let mut resolver = fx.navigator.resolver(&ctx);

        assert!(resolver.menu("main", "trunk").unwrap().is_empty());
        assert!(resolver.breadcrumbs("main").unwrap().is_empty());
        assert_eq!(resolver.get_current_page_title("main").unwrap(), "");
    }

    #[test]
    fn test_missing_request_while_handling_error_is_silent_in_strict_mode() {
        let fx = fixture_with(NavigatorConfig {
            debug: true,
            ..NavigatorConfig::default()
        });
        let ctx = PageContext::default().handling_error(true);
        let mut resolver = fx.navigator.resolver(&ctx);

        assert_eq!(resolver.get_current_page_title("main").unwrap(), "");
        assert_eq!(resolver.get_current_page_attr("url", "main").unwrap(), "");
    }

    #[test]
    fn test_url_memo_distinguishes_raw_urls() {
        let fx = fixture();
        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);
        let (_, items) = resolver.get_tree("main").unwrap();
        let about = items.iter().find(|i| i.title == "About").unwrap();

        let moved = TreeItem {
            url: "/company/".to_owned(),
            ..about.clone()
        };

        assert_eq!(resolver.url(about), "/about/");
        assert_eq!(resolver.url(&moved), "/company/");
    }

    #[test]
    fn test_unresolved_current_page_lenient_and_strict() {
        let fx = fixture();
        let ctx = page("/nowhere/");
        assert_eq!(
            fx.navigator.resolver(&ctx).get_current_page_title("main").unwrap(),
            ""
        );

        let strict = fixture_with(NavigatorConfig {
            debug: true,
            ..NavigatorConfig::default()
        });
        let err = strict
            .navigator
            .resolver(&ctx)
            .get_current_page_attr("hint", "main")
            .unwrap_err();
        assert!(matches!(
            err,
            NavError::Resolution { ref attr, ref path } if attr == "hint" && path == "/nowhere/"
        ));
    }

    #[test]
    fn test_empty_tree_renders_nothing() {
        let fx = fixture();
        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);

        assert!(resolver.menu("missing", "trunk").unwrap().is_empty());
        assert!(resolver.tree("missing").unwrap().is_empty());
    }

    #[test]
    fn test_admin_bypasses_filters_and_current() {
        let fx = fixture();
        fx.storage
            .save_item(ItemRecord {
                hidden: true,
                ..ItemRecord::new("main", "Hidden", "/hidden/")
            })
            .unwrap();
        let ctx = PageContext::new(Request::new("/").with_current_app("admin"));
        let mut resolver = fx.navigator.resolver(&ctx);

        assert!(resolver.is_admin());
        let roots = resolver.tree("main").unwrap();
        assert_eq!(titles(&roots), vec!["Home", "Products", "Hidden"]);
        assert!(roots.iter().all(|i| !i.is_current));
    }

    #[test]
    fn test_duplicate_urls_first_wins() {
        let fx = fixture();
        fx.storage
            .save_item(ItemRecord::new("main", "Home again", "/"))
            .unwrap();

        let ctx = page("/");
        let mut resolver = fx.navigator.resolver(&ctx);
        let current = resolver.current_item("main").unwrap().unwrap();
        assert_eq!(current.title, "Home");

        let roots = resolver.tree("main").unwrap();
        assert!(roots.iter().filter(|i| i.url == "/").all(|i| i.is_current));
    }

    #[test]
    fn test_current_item_across_trees() {
        let fx = fixture();
        fx.storage.save_tree("footer", "").unwrap();
        fx.storage.save_item(ItemRecord::new("footer", "About us", "/about/")).unwrap();

        let ctx = page("/about/");
        let mut resolver = fx.navigator.resolver(&ctx);

        assert_eq!(resolver.current_item("main").unwrap().unwrap().title, "About");
        assert_eq!(resolver.current_item("footer").unwrap().unwrap().title, "About us");
    }

    #[test]
    fn test_non_ascii_path_matches() {
        let fx = fixture();
        fx.storage
            .save_item(ItemRecord::new("main", "Catalog", "/%D0%BA%D0%B0%D1%82/"))
            .unwrap();

        let ctx = page("/кат/");
        let current = fx.navigator.resolver(&ctx).current_item("main").unwrap();

        assert_eq!(current.unwrap().title, "Catalog");
    }

    #[test]
    fn test_items_hook_senders() {
        let fx = fixture();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        fx.navigator.register_items_hook(
            move |mut items: Vec<TreeItem>, sender: &str, _: &PageContext| {
                log.lock().unwrap().push(sender.to_owned());
                if sender == "menu" {
                    items.retain(|i| i.title != "Products");
                }
                items
            },
        );

        let ctx = page("/");
        let menu = fx.navigator.resolver(&ctx).menu("main", "trunk").unwrap();

        assert_eq!(titles(&menu), vec!["Home"]);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["menu".to_owned(), "menu.has_children".to_owned()]
        );
    }

    #[test]
    fn test_hook_can_hide_children() {
        let fx = fixture();
        fx.navigator.register_items_hook(
            |items: Vec<TreeItem>, sender: &str, _: &PageContext| {
                if sender == "sitetree.has_children" {
                    Vec::new()
                } else {
                    items
                }
            },
        );

        let ctx = page("/");
        let roots = fx.navigator.resolver(&ctx).tree("main").unwrap();

        assert!(roots.iter().all(|i| !i.has_children));
    }

    #[test]
    fn test_dynamic_items_attached_and_resolved() {
        let fx = fixture();
        fx.navigator.register_dynamic_trees(
            vec![
                compose(vec![tree(
                    "help",
                    "Help",
                    vec![item("FAQ", "/faq/").url_as_pattern(false).alias("faq")],
                )])
                .attach_to("main", Some("about")),
            ],
            true,
        );

        let ctx = page("/faq/");
        let mut resolver = fx.navigator.resolver(&ctx);
        let crumbs = resolver.breadcrumbs("main").unwrap();

        assert_eq!(titles(&crumbs), vec!["Home", "About", "FAQ"]);
        assert!(crumbs[2].id < 0);
        assert!(crumbs[2].is_current);
    }

    #[test]
    fn test_orphan_tree_served_without_storage() {
        let fx = fixture_with(NavigatorConfig {
            dynamic_only: true,
            ..NavigatorConfig::default()
        });
        fx.navigator.register_dynamic_trees(
            vec![compose(vec![tree(
                "main",
                "",
                vec![item("Dashboard", "product_list").children(vec![item("Item", "product_detail 7")])],
            )])],
            false,
        );

        let ctx = page("/products/7/");
        let mut resolver = fx.navigator.resolver(&ctx);
        let roots = resolver.tree("main").unwrap();

        // Stored "main" items are ignored in dynamic-only mode
        assert_eq!(titles(&roots), vec!["Dashboard"]);
        assert!(roots[0].has_children);
        assert_eq!(resolver.get_current_page_title("main").unwrap(), "Item");
    }

    #[test]
    fn test_access_check_decides_before_flags() {
        let fx = fixture();
        fx.navigator.register_access_check("staff", |_: &TreeItem, ctx: &PageContext| {
            match ctx.user() {
                User::Authenticated { username, .. } if username == "staff" => Some(true),
                _ => None,
            }
        });
        fx.navigator.register_dynamic_trees(
            vec![
                compose(vec![tree(
                    "admin",
                    "",
                    vec![item("Panel", "/panel/")
                        .url_as_pattern(false)
                        .access_guest(true)
                        .access_check("staff")],
                )])
                .attach_to("main", None),
            ],
            true,
        );

        let has_panel = |user: User| {
            let ctx = PageContext::new(Request::new("/").with_user(user));
            titles(&fx.navigator.resolver(&ctx).tree("main").unwrap()).contains(&"Panel")
        };

        // The check grants staff despite `access_guest`; others fall through to it
        assert!(has_panel(User::authenticated("staff", Vec::<String>::new())));
        assert!(!has_panel(User::authenticated("ann", Vec::<String>::new())));
        assert!(has_panel(User::Anonymous));
    }

    #[test]
    fn test_dynamic_attr_through_current_page_attr() {
        let fx = fixture();
        fx.navigator.register_dynamic_trees(
            vec![
                compose(vec![tree(
                    "extra",
                    "",
                    vec![item("Help", "/help/").url_as_pattern(false).dynamic_attr("icon", "question")],
                )])
                .attach_to("main", None),
            ],
            true,
        );

        let ctx = page("/help/");
        let mut resolver = fx.navigator.resolver(&ctx);

        assert_eq!(resolver.get_current_page_attr("icon", "main").unwrap(), "question");
        assert_eq!(resolver.get_current_page_attr("url", "main").unwrap(), "/help/");
        assert_eq!(resolver.get_current_page_attr("nope", "main").unwrap(), "");
    }

    #[test]
    fn test_invalidate_drops_cached_trees() {
        let fx = fixture();
        let ctx = page("/");
        fx.navigator.resolver(&ctx).tree("main").unwrap();
        assert!(!fx.store.is_empty());

        fx.navigator.invalidate();
        assert!(fx.store.get(crate::tree_cache::CACHE_KEY).is_none());
    }
}
