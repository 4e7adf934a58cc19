//! Page service: the current index and configuration with atomic reload.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                PageService (ArcSwap)                     │
//! │                                                          │
//! │   reader ──▶ index() ──▶ Arc<PageIndex>  (lock-free)     │
//! │   reader ──▶ index() ──▶ Arc<PageIndex>                  │
//! │   watch  ──▶ reload() ── build aside ──▶ store (swap)    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A reload builds the new index completely before publishing it. Readers
//! holding the previous `Arc` keep a consistent view until they drop it.

use super::cache::{self, CacheStatus, FileSnapshotStore, SnapshotStore};
use super::PageIndex;
use crate::config::SiteConfig;
use crate::log;
use crate::page::source::StorageSource;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::path::Path;
use std::sync::Arc;

pub struct PageService {
    config: ArcSwap<SiteConfig>,
    index: ArcSwap<PageIndex>,
    store: Box<dyn SnapshotStore>,
}

impl PageService {
    /// Load `config_file` under `root` and index its page tree, persisting
    /// snapshots under the configured cache directory.
    pub fn open(root: &Path, config_file: &Path) -> Result<Self> {
        let config = SiteConfig::load(root, config_file)?;
        let store = FileSnapshotStore::new(config.cache_dir());
        Self::new(config, Box::new(store))
    }

    /// Index the local page tree of `config`.
    pub fn new(config: SiteConfig, store: Box<dyn SnapshotStore>) -> Result<Self> {
        let config = Arc::new(config);
        let (index, status) = Self::load(&config, store.as_ref())?;
        log!("pages"; "ready ({status:?}), {} pages", index.instances().len());

        Ok(Self {
            config: ArcSwap::new(config),
            index: ArcSwap::from_pointee(index),
            store,
        })
    }

    fn load(config: &Arc<SiteConfig>, store: &dyn SnapshotStore) -> Result<(PageIndex, CacheStatus)> {
        let source = StorageSource::local(config.pages_dir());
        cache::load_or_build(&source, Arc::clone(config), store)
    }

    /// The published index. Wait-free.
    #[inline]
    pub fn index(&self) -> Arc<PageIndex> {
        self.index.load_full()
    }

    #[inline]
    pub fn config(&self) -> Arc<SiteConfig> {
        self.config.load_full()
    }

    /// Rebuild (or reload the snapshot) and publish the result.
    ///
    /// On failure the previous index stays published.
    pub fn reload(&self) -> Result<CacheStatus> {
        let config = self.config();
        let (index, status) = Self::load(&config, self.store.as_ref())?;
        self.index.store(Arc::new(index));
        Ok(status)
    }

    /// Re-read the config file and reload when its settings changed.
    ///
    /// Returns `false` when the file still yields the same configuration.
    pub fn reload_config(&self) -> Result<bool> {
        let current = self.config();
        let config_file = current
            .config_path
            .strip_prefix(&current.root)
            .unwrap_or(&current.config_path);
        let fresh = SiteConfig::load(&current.root, config_file)?;
        if fresh.checksum() == current.checksum() {
            return Ok(false);
        }

        let fresh = Arc::new(fresh);
        let (index, _) = Self::load(&fresh, self.store.as_ref())?;
        self.config.store(fresh);
        self.index.store(Arc::new(index));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cache::MemorySnapshotStore;
    use crate::index::tests::write_site;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PageService) {
        let dir = TempDir::new().unwrap();
        write_site(&dir.path().join("pages"));
        fs::write(dir.path().join("site.toml"), "[cache]\ncheck = \"file\"\n").unwrap();
        let config = SiteConfig::load(dir.path(), Path::new("site.toml")).unwrap();
        let service = PageService::new(config, Box::new(MemorySnapshotStore::new())).unwrap();
        (dir, service)
    }

    #[test]
    fn test_reload_publishes_new_index() {
        let (dir, service) = setup();
        let before = service.index();
        assert!(before.find("/contact").is_none());

        fs::create_dir_all(dir.path().join("pages/contact")).unwrap();
        fs::write(dir.path().join("pages/contact/default.md"), "---\ntitle: Contact\n---\n").unwrap();
        assert_eq!(service.reload().unwrap(), CacheStatus::Miss);

        assert!(service.index().find("/contact").is_some());
        // readers holding the old index are unaffected
        assert!(before.find("/contact").is_none());
        assert_eq!(service.reload().unwrap(), CacheStatus::Hit);
    }

    #[test]
    fn test_reload_config() {
        let (dir, service) = setup();
        assert!(!service.reload_config().unwrap());
        let digest = service.index().digest().to_owned();

        fs::write(
            dir.path().join("site.toml"),
            "[cache]\ncheck = \"file\"\n\n[pages]\nhide_empty_folders = true\n",
        )
        .unwrap();
        assert!(service.reload_config().unwrap());
        assert!(service.config().pages.hide_empty_folders);
        assert_ne!(service.index().digest(), digest);
    }

    #[test]
    fn test_open_uses_file_store() {
        let dir = TempDir::new().unwrap();
        write_site(&dir.path().join("pages"));
        let service = PageService::open(dir.path(), Path::new("site.toml")).unwrap();
        assert!(service.index().find("/blog").is_some());
        assert!(dir.path().join(".cache/pages").is_dir());
    }

    #[test]
    fn test_invalid_config_keeps_previous() {
        let (dir, service) = setup();
        fs::write(dir.path().join("site.toml"), "[pages]\nbogus = 1\n").unwrap();
        assert!(service.reload_config().is_err());
        assert!(service.index().find("/blog").is_some());
    }
}
