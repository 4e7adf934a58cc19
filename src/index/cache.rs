//! Cache manager: snapshot reuse keyed by a digest of storage, locale and
//! configuration.
//!
//! ```text
//! digest = H(root, storage signal, locale, config checksum)
//!
//! fetch(digest) ── hit + same format ──▶ load snapshot verbatim
//!       │
//!       └── miss / other format ──▶ build tree ──▶ save(digest) ──▶ index
//! ```
//!
//! Store failures are logged; the freshly built index is returned anyway.

use super::routes::RouteMap;
use super::sort::SortTable;
use super::taxonomy::TaxonomyMap;
use super::{ChildrenMap, Instances, PageIndex};
use crate::config::SiteConfig;
use crate::log;
use crate::page::source::DocumentSource;
use crate::utils::hash::Digest;
use anyhow::{Context, Result};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Persisted form of a built index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: String,
    pub root: String,
    pub instances: Instances,
    pub routes: RouteMap,
    pub children: ChildrenMap,
    pub taxonomy: TaxonomyMap,
    pub sort: SortTable,
    pub last_modified: i64,
}

/// Where snapshots live.
pub trait SnapshotStore: Send + Sync {
    fn fetch(&self, digest: &str) -> Result<Option<Snapshot>>;
    fn save(&self, digest: &str, snapshot: &Snapshot) -> Result<()>;
}

/// How an index was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Disabled,
}

/// Digest deciding snapshot validity.
pub fn digest(source: &dyn DocumentSource, config: &SiteConfig) -> Result<String> {
    let signal = source.storage_signal(config.cache.check)?;
    Ok(Digest::new()
        .part(source.root())
        .part(signal)
        .part(config.language.active_locale())
        .part(config.checksum())
        .hex())
}

/// Load the snapshot matching the current digest, or build and save one.
pub fn load_or_build(
    source: &dyn DocumentSource,
    config: Arc<SiteConfig>,
    store: &dyn SnapshotStore,
) -> Result<(PageIndex, CacheStatus)> {
    let digest = digest(source, &config)?;

    if !config.cache.enabled {
        let index = PageIndex::build_with_digest(source, config, digest)?;
        return Ok((index, CacheStatus::Disabled));
    }

    match store.fetch(&digest) {
        Ok(Some(snapshot)) if snapshot.format_version == source.format_version() => {
            log!("cache"; "reusing snapshot {}", short(&digest));
            let index = PageIndex::from_snapshot(snapshot, config, digest, source.is_delegated());
            return Ok((index, CacheStatus::Hit));
        }
        Ok(Some(snapshot)) => {
            log!("cache"; "snapshot format `{}` is stale, rebuilding", snapshot.format_version);
        }
        Ok(None) => {}
        Err(err) => log!("error"; "cache read {}: {err:#}", short(&digest)),
    }

    let index = PageIndex::build_with_digest(source, config, digest)?;
    match store.save(index.digest(), &index.snapshot()) {
        Ok(()) => log!("cache"; "saved snapshot {}", short(index.digest())),
        Err(err) => log!("error"; "cache write {}: {err:#}", short(index.digest())),
    }
    Ok((index, CacheStatus::Miss))
}

fn short(digest: &str) -> &str {
    &digest[..digest.len().min(12)]
}

// ============================================================================
// Stores
// ============================================================================

/// JSON snapshot files named by digest. Saving a snapshot discards every
/// other one in the directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, digest: &str) -> PathBuf {
        self.dir.join(format!("{digest}.json"))
    }

    /// Remove snapshots other than `keep`.
    fn prune(&self, keep: &str) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let stale = path.extension().is_some_and(|ext| ext == "json")
                && path.file_stem().is_some_and(|stem| stem != keep);
            if stale {
                fs::remove_file(&path)
                    .with_context(|| format!("cannot remove `{}`", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn fetch(&self, digest: &str) -> Result<Option<Snapshot>> {
        let path = self.path(digest);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("cannot read `{}`", path.display()))?;
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt snapshot `{}`", path.display()))?;
        Ok(Some(snapshot))
    }

    fn save(&self, digest: &str, snapshot: &Snapshot) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create `{}`", self.dir.display()))?;
        let path = self.path(digest);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(snapshot)?)
            .with_context(|| format!("cannot write `{}`", tmp.display()))?;
        fs::rename(&tmp, &path)?;

        match self.prune(digest) {
            Ok(0) => {}
            Ok(n) => log!("cache"; "discarded {n} stale snapshot(s)"),
            Err(err) => log!("error"; "cache prune: {err:#}"),
        }
        Ok(())
    }
}

/// Process-local store holding serialized snapshots.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<FxHashMap<String, String>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn fetch(&self, digest: &str) -> Result<Option<Snapshot>> {
        match self.snapshots.read().get(digest) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, digest: &str, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let mut snapshots = self.snapshots.write();
        snapshots.clear();
        snapshots.insert(digest.to_owned(), json);
        Ok(())
    }
}
