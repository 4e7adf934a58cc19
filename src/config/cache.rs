//! `[cache]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// How storage changes are detected when deciding whether a snapshot is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    /// mtime of the most recently modified file under the root.
    #[default]
    File,
    /// mtime of the most recently modified directory.
    Folder,
    /// Content hash of every file.
    Hash,
    /// Never invalidate because of storage changes.
    #[serde(alias = "off")]
    None,
}

/// `[cache]` section in site.toml - snapshot settings.
///
/// # Example
/// ```toml
/// [cache]
/// enabled = true
/// check = "folder"
/// dir = "~/.cache/my-site"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Persist and reuse index snapshots.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub enabled: bool,

    /// Storage-change signal feeding the digest.
    #[serde(default)]
    pub check: CheckMethod,

    /// Snapshot directory (tilde-expanded, relative to the project root).
    #[serde(default = "defaults::cache::dir")]
    #[educe(Default = defaults::cache::dir())]
    pub dir: String,
}
