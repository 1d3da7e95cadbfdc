//! Configuration management for Pagewright.
//!
//! Parses `pw.toml` configuration files with serde and provides
//! auto-discovery of config files in parent directories.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! Path-like configuration values support environment variable expansion:
//!
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Expanded fields:
//! - `pages.source_dir`
//! - `pages.meta_filename`
//! - `cache.dir`
//! - `cache.version`

mod expand;

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override page tree root.
    pub source_dir: Option<PathBuf>,
    /// Override persistent cache enabled flag.
    pub cache_enabled: Option<bool>,
    /// Override persistent cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Override revalidation concurrency limit.
    pub concurrency: Option<usize>,
}

/// Configuration filename to search for.
const CONFIG_FILENAME: &str = "pw.toml";

const DEFAULT_SOURCE_DIR: &str = "app";
const DEFAULT_META_FILENAME: &str = "meta.yaml";
const DEFAULT_CACHE_DIR: &str = ".pw/cache";
const DEFAULT_MAX_PAGES: usize = 1000;
const DEFAULT_MAX_FRAGMENTS: usize = 5000;
const DEFAULT_CONCURRENCY: usize = 4;

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Page tree configuration (paths are relative strings from TOML).
    pages: PagesConfigRaw,
    /// Cache configuration (paths are relative strings from TOML).
    cache: CacheConfigRaw,
    /// Background regeneration configuration.
    pub revalidation: RevalidationConfig,

    /// Resolved page tree configuration (set after loading).
    #[serde(skip)]
    pub pages_resolved: PagesConfig,
    /// Resolved cache configuration (set after loading).
    #[serde(skip)]
    pub cache_resolved: CacheConfig,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Raw page tree configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct PagesConfigRaw {
    source_dir: Option<String>,
    meta_filename: Option<String>,
}

/// Resolved page tree configuration with absolute paths.
#[derive(Debug, Default)]
pub struct PagesConfig {
    /// Page tree root.
    pub source_dir: PathBuf,
    /// Classifier sidecar filename.
    pub meta_filename: String,
}

/// Raw cache configuration as parsed from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct CacheConfigRaw {
    enabled: Option<bool>,
    dir: Option<String>,
    version: Option<String>,
    max_pages: Option<usize>,
    max_fragments: Option<usize>,
}

/// Resolved cache configuration with absolute paths.
#[derive(Debug, Default)]
pub struct CacheConfig {
    /// Whether the persistent tier is used.
    pub enabled: bool,
    /// Persistent tier root.
    pub dir: PathBuf,
    /// Version stamp shared by every program using the persistent tier.
    /// `None` lets each program pick its own.
    pub version: Option<String>,
    /// Page entries kept in memory.
    pub max_pages: usize,
    /// Fragment entries kept in memory.
    pub max_fragments: usize,
}

/// Background regeneration configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RevalidationConfig {
    /// Maximum number of paths regenerated at the same time.
    pub concurrency: usize,
}

impl Default for RevalidationConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
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
        /// Error message (e.g., "${`PW_CACHE`} not set").
        message: String,
    },
}

/// Require a count to be positive.
fn require_positive(value: usize, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "{field} must be greater than 0"
        )));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file.
    /// Otherwise, searches for `pw.toml` in current directory and parents.
    ///
    /// CLI settings are applied after loading and path resolution, allowing CLI
    /// arguments to take precedence over config file values. The result is
    /// validated once more after they are applied.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails or
    /// a value is out of range.
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
            config.validate()?;
        }

        Ok(config)
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(source_dir) = &settings.source_dir {
            self.pages_resolved.source_dir.clone_from(source_dir);
        }
        if let Some(cache_enabled) = settings.cache_enabled {
            self.cache_resolved.enabled = cache_enabled;
        }
        if let Some(cache_dir) = &settings.cache_dir {
            self.cache_resolved.dir.clone_from(cache_dir);
        }
        if let Some(concurrency) = settings.concurrency {
            self.revalidation.concurrency = concurrency;
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
            pages: PagesConfigRaw::default(),
            cache: CacheConfigRaw::default(),
            revalidation: RevalidationConfig::default(),
            pages_resolved: PagesConfig {
                source_dir: base.join(DEFAULT_SOURCE_DIR),
                meta_filename: DEFAULT_META_FILENAME.to_owned(),
            },
            cache_resolved: CacheConfig {
                enabled: true,
                dir: base.join(DEFAULT_CACHE_DIR),
                version: None,
                max_pages: DEFAULT_MAX_PAGES,
                max_fragments: DEFAULT_MAX_FRAGMENTS,
            },
            config_path: None,
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        // Expand environment variables before path resolution
        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pages_resolved.meta_filename.is_empty() {
            return Err(ConfigError::Validation(
                "pages.meta_filename cannot be empty".to_owned(),
            ));
        }
        if self.cache_resolved.version.as_deref() == Some("") {
            return Err(ConfigError::Validation(
                "cache.version cannot be empty".to_owned(),
            ));
        }
        require_positive(self.cache_resolved.max_pages, "cache.max_pages")?;
        require_positive(self.cache_resolved.max_fragments, "cache.max_fragments")?;
        require_positive(self.revalidation.concurrency, "revalidation.concurrency")?;
        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(ref dir) = self.pages.source_dir {
            self.pages.source_dir = Some(expand::expand_env(dir, "pages.source_dir")?);
        }
        if let Some(ref name) = self.pages.meta_filename {
            self.pages.meta_filename = Some(expand::expand_env(name, "pages.meta_filename")?);
        }
        if let Some(ref dir) = self.cache.dir {
            self.cache.dir = Some(expand::expand_env(dir, "cache.dir")?);
        }
        if let Some(ref version) = self.cache.version {
            self.cache.version = Some(expand::expand_env(version, "cache.version")?);
        }
        Ok(())
    }

    /// Resolve relative paths against the config directory and fill defaults.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: Option<&str>, default: &str| config_dir.join(path.unwrap_or(default));

        self.pages_resolved = PagesConfig {
            source_dir: resolve(self.pages.source_dir.as_deref(), DEFAULT_SOURCE_DIR),
            meta_filename: self
                .pages
                .meta_filename
                .clone()
                .unwrap_or_else(|| DEFAULT_META_FILENAME.to_owned()),
        };

        self.cache_resolved = CacheConfig {
            enabled: self.cache.enabled.unwrap_or(true),
            dir: resolve(self.cache.dir.as_deref(), DEFAULT_CACHE_DIR),
            version: self.cache.version.clone(),
            max_pages: self.cache.max_pages.unwrap_or(DEFAULT_MAX_PAGES),
            max_fragments: self.cache.max_fragments.unwrap_or(DEFAULT_MAX_FRAGMENTS),
        };
    }
}
