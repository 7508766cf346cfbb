//! Pluggable post-processing of item lists and custom access checks.

use crate::context::PageContext;
use crate::error::NavError;
use crate::model::TreeItem;

/// Rewrites item lists right before they are returned.
///
/// `sender` names the list being assembled: `menu`, `breadcrumbs`,
/// `sitetree`, `{nav}.children` or `{nav}.has_children`.
///
/// Any `Fn(Vec<TreeItem>, &str, &PageContext) -> Vec<TreeItem>` closure is a
/// hook:
///
/// ```
/// use navtree::{ItemsHook, PageContext, TreeItem};
///
/// let hook = |mut items: Vec<TreeItem>, sender: &str, _: &PageContext| {
///     if sender == "menu" {
///         items.retain(|item| !item.title.starts_with('_'));
///     }
///     items
/// };
/// let items = vec![TreeItem { title: "_draft".into(), ..TreeItem::default() }];
/// assert!(hook.apply(items, "menu", &PageContext::default()).unwrap().is_empty());
/// ```
pub trait ItemsHook: Send + Sync {
    /// Process `items` for `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Hook`] if the hook cannot process the list.
    fn apply(
        &self,
        items: Vec<TreeItem>,
        sender: &str,
        ctx: &PageContext,
    ) -> Result<Vec<TreeItem>, NavError>;
}

impl<F> ItemsHook for F
where
    F: Fn(Vec<TreeItem>, &str, &PageContext) -> Vec<TreeItem> + Send + Sync,
{
    fn apply(
        &self,
        items: Vec<TreeItem>,
        sender: &str,
        ctx: &PageContext,
    ) -> Result<Vec<TreeItem>, NavError> {
        Ok(self(items, sender, ctx))
    }
}

/// Custom access rule referenced by name from dynamic items.
///
/// Returning `Some` decides access outright; `None` falls through to the
/// standard login, guest and permission checks.
pub trait AccessCheck: Send + Sync {
    /// Decide whether the page's user may see `item`.
    fn check(&self, item: &TreeItem, ctx: &PageContext) -> Option<bool>;
}

impl<F> AccessCheck for F
where
    F: Fn(&TreeItem, &PageContext) -> Option<bool> + Send + Sync,
{
    fn check(&self, item: &TreeItem, ctx: &PageContext) -> Option<bool> {
        self(item, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Request, User};

    struct Rejecting;

    impl ItemsHook for Rejecting {
        fn apply(
            &self,
            _items: Vec<TreeItem>,
            sender: &str,
            _ctx: &PageContext,
        ) -> Result<Vec<TreeItem>, NavError> {
            Err(NavError::Hook(format!("unsupported sender {sender}")))
        }
    }

    #[test]
    fn test_closure_hook_sees_sender() {
        let hook = |items: Vec<TreeItem>, sender: &str, _: &PageContext| {
            items
                .into_iter()
                .map(|mut item| {
                    item.title_resolved = format!("{sender}: {}", item.title);
                    item
                })
                .collect()
        };
        let items = vec![TreeItem {
            title: "Home".to_owned(),
            ..TreeItem::default()
        }];

        let out = hook
            .apply(items, "menu.children", &PageContext::default())
            .unwrap();

        assert_eq!(out[0].title_resolved, "menu.children: Home");
    }

    #[test]
    fn test_hook_errors_propagate() {
        let err = Rejecting
            .apply(Vec::new(), "menu", &PageContext::default())
            .unwrap_err();
        assert!(matches!(err, NavError::Hook(_)));
    }

    #[test]
    fn test_closure_access_check() {
        let staff_only = |_: &TreeItem, ctx: &PageContext| match ctx.user() {
            User::Authenticated { username, .. } => Some(username == "staff"),
            User::Anonymous => None,
        };
        let item = TreeItem::default();

        let staff = PageContext::new(Request::new("/").with_user(User::authenticated(
            "staff",
            Vec::<String>::new(),
        )));
        let other = PageContext::new(
            Request::new("/").with_user(User::authenticated("bob", Vec::<String>::new())),
        );

        assert_eq!(staff_only.check(&item, &staff), Some(true));
        assert_eq!(staff_only.check(&item, &other), Some(false));
        assert_eq!(staff_only.check(&item, &PageContext::default()), None);
    }
}
