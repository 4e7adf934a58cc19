//! `[pages]` section configuration.
//!
//! Controls how the page tree is discovered on disk and how siblings are
//! ordered when a page does not say otherwise.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[pages]` section in site.toml - page discovery settings.
///
/// # Example
/// ```toml
/// [pages]
/// root = "pages"
/// extensions = [".md", ".markdown"]
/// ignore_hidden = true
/// hide_empty_folders = true
///
/// [pages.order]
/// by = "date"
/// dir = "desc"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PagesConfig {
    /// Storage root of the page tree, relative to the project root.
    #[serde(default = "defaults::pages::root")]
    #[educe(Default = defaults::pages::root())]
    pub root: PathBuf,

    /// Accepted content file extensions, highest priority first.
    #[serde(default = "defaults::pages::extensions")]
    #[educe(Default = defaults::pages::extensions())]
    pub extensions: Vec<String>,

    /// File names skipped during discovery.
    #[serde(default = "defaults::pages::ignore_files")]
    #[educe(Default = defaults::pages::ignore_files())]
    pub ignore_files: Vec<String>,

    /// Folder names skipped during discovery (with their subtrees).
    #[serde(default = "defaults::pages::ignore_folders")]
    #[educe(Default = defaults::pages::ignore_folders())]
    pub ignore_folders: Vec<String>,

    /// Skip every entry whose name starts with `hidden_marker`.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub ignore_hidden: bool,

    /// Name prefix of hidden entries.
    #[serde(default = "defaults::pages::hidden_marker")]
    #[educe(Default = defaults::pages::hidden_marker())]
    pub hidden_marker: String,

    /// Make folders without a content file invisible.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub hide_empty_folders: bool,

    /// Folders whose name contains this separator are not pages.
    #[serde(default = "defaults::pages::param_sep")]
    #[educe(Default = defaults::pages::param_sep())]
    pub param_sep: String,

    /// Folder prefix marking modular (non-routable) child pages.
    #[serde(default = "defaults::pages::hide_marker")]
    #[educe(Default = defaults::pages::hide_marker())]
    pub hide_marker: String,

    /// Aggregate template whose modification time includes its children.
    #[serde(default = "defaults::pages::modular_template")]
    #[educe(Default = defaults::pages::modular_template())]
    pub modular_template: String,

    /// Enable locale-aware collation when sorting.
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub intl_enabled: bool,

    /// Collation locale. Empty disables collation even with `intl_enabled`.
    #[serde(default = "defaults::pages::locale")]
    #[educe(Default = defaults::pages::locale())]
    pub locale: String,

    /// chrono format tried first when parsing header dates.
    #[serde(default = "defaults::pages::date_format")]
    #[educe(Default = defaults::pages::date_format())]
    pub date_format: String,

    /// Default sibling ordering.
    #[serde(default)]
    pub order: OrderConfig,
}

/// `[pages.order]` section - default ordering inherited by every page.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct OrderConfig {
    /// Order field (`default`, `title`, `date`, `header.<name>`, ...).
    #[serde(default = "defaults::pages::order::by")]
    #[educe(Default = defaults::pages::order::by())]
    pub by: String,

    /// `asc` or `desc`.
    #[serde(default = "defaults::pages::order::dir")]
    #[educe(Default = defaults::pages::order::dir())]
    pub dir: String,
}
