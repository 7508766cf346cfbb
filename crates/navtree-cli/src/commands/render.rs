//! `navtree menu`, `navtree breadcrumbs` and `navtree sitetree` commands.

use clap::Args;
use navtree::{NavError, NavType, Resolver, TreeItem};
use serde::Serialize;

use super::{PageArgs, SourceArgs, open_navigator};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the menu command.
#[derive(Args)]
pub(crate) struct MenuArgs {
    /// Tree alias.
    alias: String,

    /// Comma-separated branches: `trunk`, `this-children`, `this-siblings`,
    /// `this-ancestor-children`, `this-parent-siblings`, item ids or aliases.
    #[arg(short, long, default_value = "trunk")]
    branches: String,

    /// Print JSON instead of an indented list.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    page: PageArgs,
}

impl MenuArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, self.page.routes())?;
        let ctx = self.page.context();
        let mut resolver = navigator.resolver(&ctx);

        let items = resolver.menu(&self.alias, &self.branches)?;
        print_items(output, &flat_views(&items), self.json)
    }
}

/// Arguments for the breadcrumbs command.
#[derive(Args)]
pub(crate) struct BreadcrumbsArgs {
    /// Tree alias.
    alias: String,

    /// Print JSON instead of an indented list.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    page: PageArgs,
}

impl BreadcrumbsArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, self.page.routes())?;
        let ctx = self.page.context();
        let mut resolver = navigator.resolver(&ctx);

        let items = resolver.breadcrumbs(&self.alias)?;
        if items.is_empty() {
            output.warning("No breadcrumbs: the path matches no visible item");
            return Ok(());
        }
        if self.json {
            return print_items(output, &flat_views(&items), true);
        }
        let trail = items
            .iter()
            .map(|item| item.title_resolved.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        output.line(&trail);
        Ok(())
    }
}

/// Arguments for the sitetree command.
#[derive(Args)]
pub(crate) struct SitetreeArgs {
    /// Tree alias.
    alias: String,

    /// Print JSON instead of an indented list.
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    source: SourceArgs,

    #[command(flatten)]
    page: PageArgs,
}

impl SitetreeArgs {
    pub(crate) fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.source.load_config()?;
        let navigator = open_navigator(&config, self.page.routes())?;
        let ctx = self.page.context();
        let mut resolver = navigator.resolver(&ctx);

        let roots = resolver.tree(&self.alias)?;
        let views = expand(&mut resolver, roots)?;
        print_items(output, &views, self.json)
    }
}

/// An item as printed by the CLI.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct ItemView {
    id: i64,
    title: String,
    url: String,
    depth: usize,
    is_current: bool,
    in_current_branch: bool,
    has_children: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<ItemView>,
}

impl From<&TreeItem> for ItemView {
    fn from(item: &TreeItem) -> Self {
        Self {
            id: item.id,
            title: item.title_resolved.clone(),
            url: item.url_resolved.clone(),
            depth: item.depth,
            is_current: item.is_current,
            in_current_branch: item.in_current_branch,
            has_children: item.has_children,
            children: Vec::new(),
        }
    }
}

fn flat_views(items: &[TreeItem]) -> Vec<ItemView> {
    items.iter().map(ItemView::from).collect()
}

/// Descend into every item with visible site tree children.
fn expand(resolver: &mut Resolver<'_>, items: Vec<TreeItem>) -> Result<Vec<ItemView>, NavError> {
    let mut views = Vec::with_capacity(items.len());
    for item in items {
        let mut view = ItemView::from(&item);
        if item.has_children {
            let children = resolver.children(&item, NavType::Sitetree)?;
            view.children = expand(resolver, children)?;
        }
        views.push(view);
    }
    Ok(views)
}

/// Print items as JSON or as an indented list.
///
/// Indentation is relative to the shallowest item. The current item is
/// highlighted and marked `*`; its ancestors are marked `+`.
fn print_items(output: &Output, views: &[ItemView], json: bool) -> Result<(), CliError> {
    if json {
        output.line(&serde_json::to_string_pretty(views)?);
        return Ok(());
    }
    let base = views.iter().map(|v| v.depth).min().unwrap_or(0);
    for line in render_lines(views, base) {
        if line.starts_with('*') {
            output.highlight(&line);
        } else {
            output.line(&line);
        }
    }
    Ok(())
}

fn render_lines(views: &[ItemView], base: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for view in views {
        let marker = if view.is_current {
            '*'
        } else if view.in_current_branch {
            '+'
        } else {
            ' '
        };
        let indent = "  ".repeat(view.depth.saturating_sub(base));
        lines.push(format!("{marker} {indent}{}  {}", view.title, view.url));
        lines.extend(render_lines(&view.children, base));
    }
    lines
}
