//! Configuration management for navtree.
//!
//! Parses `navtree.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! String configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `cache.dir`
//! - `storage.fixture`
//! - `resolver.unresolved_marker`

mod expand;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "navtree.toml";

/// One year, the default lifetime of the cached composite.
const DEFAULT_CACHE_TIMEOUT: u64 = 31_536_000;

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override the cache backend.
    pub cache_backend: Option<CacheBackend>,
    /// Override the file cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Override the fixture to load trees from.
    pub fixture: Option<PathBuf>,
    /// Override the debug flag.
    pub debug: Option<bool>,
}

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache configuration (paths are relative strings from TOML).
    cache: CacheConfigRaw,
    /// Resolver behavior.
    pub resolver: ResolverConfig,
    /// Internationalization.
    pub i18n: I18nConfig,
    /// Backing store configuration (paths are relative strings from TOML).
    storage: StorageConfigRaw,

    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Resolved storage configuration (set after loading).
    #[serde(skip)]
    pub storage_resolved: StorageConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Cache backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local in-memory cache.
    #[default]
    Memory,
    /// Directory on disk, shared between processes.
    File,
    /// No caching; every request rebuilds trees from storage.
    None,
}

impl std::str::FromStr for CacheBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "none" => Ok(Self::None),
            other => Err(ConfigError::Validation(format!(
                "unknown cache backend `{other}` (expected memory, file or none)"
            ))),
        }
    }
}

/// Raw cache configuration as parsed from TOML.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct CacheConfigRaw {
    backend: CacheBackend,
    dir: Option<String>,
    timeout: u64,
    version: String,
}

impl Default for CacheConfigRaw {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            dir: None,
            timeout: DEFAULT_CACHE_TIMEOUT,
            version: String::new(),
        }
    }
}

/// Resolved cache configuration with absolute paths.
#[derive(Debug)]
pub struct CacheConfig {
    /// Which cache backend to use.
    pub backend: CacheBackend,
    /// Directory for the file backend.
    pub dir: PathBuf,
    /// Lifetime of cached entries.
    pub timeout: Duration,
    /// Cache format version; a mismatch wipes the file cache.
    pub version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            dir: PathBuf::from(".navtree/cache"),
            timeout: Duration::from_secs(DEFAULT_CACHE_TIMEOUT),
            version: String::new(),
        }
    }
}

/// Resolver behavior.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// URL given to items whose URL cannot be resolved.
    pub unresolved_marker: String,
    /// Debug mode.
    pub debug: bool,
    /// Raise resolution errors instead of degrading, when in debug mode.
    pub raise_items_errors_on_debug: bool,
    /// Never query the backing store; only dynamic trees exist.
    pub dynamic_only: bool,
    /// Application name that turns on the admin bypass.
    pub admin_app_name: String,
    /// Value used for the root entry of parent choices.
    pub items_field_root_id: String,
    /// Title used for the root entry of parent choices.
    pub root_title: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            unresolved_marker: "#unresolved".to_owned(),
            debug: false,
            raise_items_errors_on_debug: true,
            dynamic_only: false,
            admin_app_name: "admin".to_owned(),
            items_field_root_id: String::new(),
            root_title: "---------".to_owned(),
        }
    }
}

impl ResolverConfig {
    /// Whether resolution errors should be raised rather than degraded.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.debug && self.raise_items_errors_on_debug
    }
}

/// Internationalization configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    /// Tree aliases that have per-language variants (`{alias}_{language}`).
    pub trees: Vec<String>,
}

/// Raw storage configuration as parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StorageConfigRaw {
    fixture: Option<String>,
}

/// Resolved backing store configuration.
#[derive(Debug, Default)]
pub struct StorageConfig {
    /// JSON fixture loaded into the in-memory backing store.
    pub fixture: Option<PathBuf>,
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`cache.dir`").
        field: String,
        /// Error message (e.g., "${`CACHE_ROOT`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `navtree.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config() {
            Self::load_from_file(&discovered)?
        } else {
            Self::default_with_cwd()
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Parse configuration from TOML text, resolving paths against `base`.
    ///
    /// # Errors
    ///
    /// Returns error if parsing, expansion or validation fails.
    pub fn from_toml(content: &str, base: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars()?;
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(backend) = settings.cache_backend {
            self.cache_resolved.backend = backend;
        }
        if let Some(dir) = &settings.cache_dir {
            self.cache_resolved.dir.clone_from(dir);
        }
        if let Some(fixture) = &settings.fixture {
            self.storage_resolved.fixture = Some(fixture.clone());
        }
        if let Some(debug) = settings.debug {
            self.resolver.debug = debug;
        }
    }

    /// Search for config file in current directory and parents.
    fn discover_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let candidate = current.join(CONFIG_FILENAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Create default config with paths relative to current working directory.
    fn default_with_cwd() -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::default_with_base(&cwd)
    }

    /// Create default config with paths relative to given base directory.
    fn default_with_base(base: &Path) -> Self {
        Self {
            cache: CacheConfigRaw::default(),
            resolver: ResolverConfig::default(),
            i18n: I18nConfig::default(),
            storage: StorageConfigRaw::default(),
            cache_resolved: CacheConfig {
                dir: base.join(".navtree").join("cache"),
                ..CacheConfig::default()
            },
            storage_resolved: StorageConfig::default(),
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config_dir = path.parent().unwrap_or(Path::new("."));
        let mut config = Self::from_toml(&content, config_dir)?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Called automatically after loading from file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.timeout == 0 {
            return Err(ConfigError::Validation(
                "cache.timeout must be greater than 0".to_owned(),
            ));
        }
        if let Some(dir) = &self.cache.dir {
            require_non_empty(dir, "cache.dir")?;
        }
        require_non_empty(&self.resolver.unresolved_marker, "resolver.unresolved_marker")?;
        require_non_empty(&self.resolver.admin_app_name, "resolver.admin_app_name")?;
        for alias in &self.i18n.trees {
            require_non_empty(alias, "i18n.trees")?;
        }
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }
        if let Some(ref fixture) = self.storage.fixture {
            self.storage.fixture = Some(expand::expand_env(fixture, "storage.fixture")?);
        }
        self.resolver.unresolved_marker =
            expand::expand_env(&self.resolver.unresolved_marker, "resolver.unresolved_marker")?;
        Ok(())
    }

    /// Resolve relative paths to absolute paths based on config directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        self.cache_resolved = CacheConfig {
            backend: self.cache.backend,
            dir: config_dir.join(self.cache.dir.as_deref().unwrap_or(".navtree/cache")),
            timeout: Duration::from_secs(self.cache.timeout),
            version: self.cache.version.clone(),
        };
        self.storage_resolved = StorageConfig {
            fixture: self.storage.fixture.as_deref().map(|f| config_dir.join(f)),
        };
    }
}
