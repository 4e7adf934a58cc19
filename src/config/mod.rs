//! Site configuration management for `site.toml`.
//!
//! # Sections
//!
//! | Section        | Purpose                                             |
//! |----------------|-----------------------------------------------------|
//! | `[pages]`      | Page discovery (root, extensions, ignore lists)     |
//! | `[cache]`      | Index snapshot persistence and change detection     |
//! | `[home]`       | Home alias served at `/` (with per-locale aliases)  |
//! | `[language]`   | Active/default locale                               |
//! | `[site]`       | Taxonomies, redirect and rewrite rule tables        |
//! | `[pagination]` | Default collection page size                        |
//!
//! # Example
//!
//! ```toml
//! [pages]
//! root = "pages"
//! hide_empty_folders = true
//!
//! [pages.order]
//! by = "title"
//!
//! [cache]
//! check = "folder"
//!
//! [[site.redirects]]
//! from = "^/old/(.*)"
//! to = "/new/$1"
//! ```

mod cache;
pub mod defaults;
mod error;
mod pages;
mod site;

pub use cache::{CacheConfig, CheckMethod};
pub use error::ConfigError;
pub use pages::{OrderConfig, PagesConfig};
pub use site::{HomeConfig, LanguageConfig, PaginationConfig, RouteRule, SiteSettings};

use crate::log;
use crate::utils::hash::hash_str;
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Default config file name, relative to the project root.
pub const CONFIG_FILE: &str = "site.toml";

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing site.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute project root (set after loading)
    #[serde(skip)]
    #[educe(Default = PathBuf::from("./"))]
    pub root: PathBuf,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Page discovery settings
    #[serde(default)]
    pub pages: PagesConfig,

    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Home page alias
    #[serde(default)]
    pub home: HomeConfig,

    /// Locale settings
    #[serde(default)]
    pub language: LanguageConfig,

    /// Taxonomies, redirects and rewrite rules
    #[serde(default)]
    pub site: SiteSettings,

    /// Collection pagination defaults
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load `config_file` under `root`, falling back to defaults when absent,
    /// then anchor every relative path at `root` and validate.
    pub fn load(root: &Path, config_file: &Path) -> Result<Self> {
        let root = Self::normalize_path(root);
        let config_path = Self::normalize_path(&root.join(config_file));

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            log!("config"; "{} not found, using defaults", config_path.display());
            Self::default()
        };

        config.config_path = config_path;
        config.set_root(&root);
        config.validate()?;
        Ok(config)
    }

    /// Set the project root, normalized to an absolute path
    pub fn set_root(&mut self, root: &Path) {
        self.root = Self::normalize_path(root);
    }

    /// Absolute storage root of the page tree
    pub fn pages_dir(&self) -> PathBuf {
        Self::normalize_path(&self.root.join(&self.pages.root))
    }

    /// Absolute snapshot directory (tilde-expanded)
    pub fn cache_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.cache.dir).into_owned();
        let path = PathBuf::from(expanded);
        if path.is_relative() {
            self.root.join(path)
        } else {
            path
        }
    }

    /// Content extensions in priority order, language variants included
    pub fn page_extensions(&self) -> Vec<String> {
        self.language.fallback_extensions(&self.pages.extensions)
    }

    /// Home alias without slashes (`home` for `/home`)
    pub fn home_alias(&self) -> String {
        self.home.resolve(&self.language)
    }

    /// Digest of the active configuration, mixed into the index digest.
    ///
    /// Runtime-only fields (root, config path) are not part of it.
    pub fn checksum(&self) -> String {
        match serde_json::to_string(self) {
            Ok(serialized) => hash_str(&serialized),
            Err(err) => {
                log!("error"; "config checksum: {err}");
                String::new()
            }
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration values that serde cannot check.
    ///
    /// Redirect and rewrite patterns are not compiled here: a broken rule is
    /// logged and skipped when the route index is used.
    pub fn validate(&self) -> Result<()> {
        let pages = &self.pages;
        if pages.extensions.is_empty() {
            bail!(ConfigError::invalid("pages", "`extensions` must have at least one element"));
        }

        if let Some(ext) = pages.extensions.iter().find(|e| !e.starts_with('.')) {
            bail!(ConfigError::invalid(
                "pages",
                format!("`extensions` entry `{ext}` must start with `.`")
            ));
        }

        if pages.param_sep.is_empty() {
            bail!(ConfigError::invalid("pages", "`param_sep` must not be empty"));
        }

        if pages.hide_marker.is_empty() {
            bail!(ConfigError::invalid("pages", "`hide_marker` must not be empty"));
        }

        if pages.ignore_hidden && pages.hidden_marker.is_empty() {
            bail!(ConfigError::invalid(
                "pages",
                "`hidden_marker` must not be empty while `ignore_hidden` is set"
            ));
        }

        if !matches!(pages.order.dir.as_str(), "asc" | "desc") {
            bail!(ConfigError::invalid("pages.order", "`dir` must be `asc` or `desc`"));
        }

        if self.language.enabled && (self.language.active.is_empty() || self.language.default.is_empty())
        {
            bail!(ConfigError::invalid(
                "language",
                "`active` and `default` are required when enabled"
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
