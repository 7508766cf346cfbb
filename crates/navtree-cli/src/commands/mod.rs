//! CLI command implementations.
//!
//! Every command loads `navtree.toml` (or the file given with `--config`),
//! applies its flags on top and reads trees from the configured fixture.

pub(crate) mod choices;
pub(crate) mod dump;
pub(crate) mod page;
pub(crate) mod render;
pub(crate) mod reset;

pub(crate) use choices::ChoicesArgs;
pub(crate) use dump::DumpArgs;
pub(crate) use page::{PageAttrArgs, PageTitleArgs};
pub(crate) use render::{BreadcrumbsArgs, MenuArgs, SitetreeArgs};
pub(crate) use reset::ResetArgs;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use navtree::{Navigator, NavigatorConfig, PageContext, Request, RouteTable, User};
use navtree_cache::{CacheStore, FileStore, MemoryStore, NullStore};
use navtree_config::{CacheBackend, CacheConfig, CliSettings, Config};
use navtree_storage::{Fixture, MemoryStorage};
use serde_json::Value;

use crate::error::CliError;

/// Where trees and cached data come from.
#[derive(Args)]
pub(crate) struct SourceArgs {
    /// Path to configuration file (default: auto-discover navtree.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON fixture to read trees from (overrides config).
    #[arg(short, long, env = "NAVTREE_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Cache backend: memory, file or none (overrides config).
    #[arg(long)]
    cache_backend: Option<CacheBackend>,

    /// Directory of the file cache (overrides config).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Fail when the current page matches no item.
    #[arg(long)]
    debug: bool,
}

impl SourceArgs {
    /// Load the configuration with the flags applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            cache_backend: self.cache_backend,
            cache_dir: self.cache_dir.clone(),
            fixture: self.fixture.clone(),
            debug: self.debug.then_some(true),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// The page navigation is rendered for.
#[derive(Args)]
pub(crate) struct PageArgs {
    /// Request path of the page (without it no request is bound).
    #[arg(short, long)]
    path: Option<String>,

    /// Render for this logged-in user (default: anonymous).
    #[arg(short, long)]
    user: Option<String>,

    /// Permission granted to the user, as `app_label.codename` (repeatable).
    #[arg(long = "perm", value_name = "PERM", requires = "user")]
    perms: Vec<String>,

    /// Application serving the request.
    #[arg(long, default_value = "")]
    app: String,

    /// Active language code.
    #[arg(short, long, default_value = "")]
    language: String,

    /// Template variable; the value is read as JSON, or as text if that fails (repeatable).
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    vars: Vec<(String, String)>,

    /// Named route for pattern URLs, e.g. `product_detail=/products/<id>/` (repeatable).
    #[arg(long = "route", value_name = "NAME=TEMPLATE", value_parser = parse_assignment)]
    routes: Vec<(String, String)>,
}

impl PageArgs {
    pub(crate) fn context(&self) -> PageContext {
        let mut ctx = match &self.path {
            Some(path) => {
                let user = match &self.user {
                    Some(name) => User::authenticated(name.as_str(), self.perms.iter().cloned()),
                    None => User::Anonymous,
                };
                PageContext::new(
                    Request::new(path.as_str())
                        .with_user(user)
                        .with_current_app(self.app.as_str()),
                )
            }
            None => PageContext::default(),
        };
        ctx = ctx.with_language(self.language.as_str());
        for (name, raw) in &self.vars {
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            ctx = ctx.with_var(name.as_str(), value);
        }
        ctx
    }

    pub(crate) fn routes(&self) -> RouteTable {
        let mut table = RouteTable::new();
        for (name, template) in &self.routes {
            table.insert(name.as_str(), template);
        }
        table
    }
}

/// Split `NAME=VALUE`.
fn parse_assignment(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_owned(), value.to_owned())),
        _ => Err(format!("expected NAME=VALUE, got `{s}`")),
    }
}

/// Read the configured fixture into memory.
pub(crate) fn load_storage(config: &Config) -> Result<Arc<MemoryStorage>, CliError> {
    let Some(path) = &config.storage_resolved.fixture else {
        return Err(CliError::Validation(
            "No fixture configured: pass --fixture or set storage.fixture in navtree.toml"
                .to_owned(),
        ));
    };
    tracing::info!(path = %path.display(), "Loading fixture");
    let storage = MemoryStorage::from_fixture(Fixture::read(path)?)?;
    Ok(Arc::new(storage))
}

/// Create the cache store selected by the configuration.
pub(crate) fn cache_store(config: &CacheConfig) -> Arc<dyn CacheStore> {
    match config.backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File => Arc::new(FileStore::new(config.dir.clone(), &config.version)),
        CacheBackend::None => Arc::new(NullStore),
    }
}

/// Map the configuration onto navigator settings.
pub(crate) fn navigator_config(config: &Config) -> NavigatorConfig {
    let resolver = &config.resolver;
    NavigatorConfig {
        cache_timeout: config.cache_resolved.timeout,
        unresolved_marker: resolver.unresolved_marker.clone(),
        debug: resolver.debug,
        raise_items_errors_on_debug: resolver.raise_items_errors_on_debug,
        dynamic_only: resolver.dynamic_only,
        admin_app_name: resolver.admin_app_name.clone(),
        items_field_root_id: resolver.items_field_root_id.clone(),
        root_title: resolver.root_title.clone(),
    }
}

/// Build a navigator over the configured fixture and cache.
pub(crate) fn open_navigator(config: &Config, routes: RouteTable) -> Result<Navigator, CliError> {
    let storage = load_storage(config)?;
    let navigator = Navigator::new(
        storage,
        cache_store(&config.cache_resolved),
        Arc::new(routes),
        navigator_config(config),
    )?;
    navigator.register_i18n_trees(config.i18n.trees.iter().cloned());
    Ok(navigator)
}
