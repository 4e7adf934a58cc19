//! Document producers.
//!
//! The tree builder is written once against [`DocumentSource`]; two
//! producers implement it:
//!
//! ```text
//!   ┌──────────────┐      ┌───────────────────┐
//!   │ TreeBuilder  │─────▶│  DocumentSource   │
//!   └──────────────┘      └─────────┬─────────┘
//!                       ┌───────────┴────────────┐
//!                       ▼                        ▼
//!             StorageSource<S: Storage>   DelegatedSource<D>
//!             (directory walk)            (object store index)
//! ```
//!
//! [`Storage`] is the narrow filesystem surface the walker needs. The
//! default [`LocalStorage`] maps it onto the local disk.

use super::header::Header;
use crate::config::CheckMethod;
use crate::utils::hash::{Digest, hash_bytes};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Snapshot schema of storage-backed indexes.
pub const PAGE_FORMAT: &str = "page-v1";

// ============================================================================
// Producer Interface
// ============================================================================

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    pub modified: i64,
}

/// The selected content file of a directory, read and parsed.
#[derive(Debug, Clone, Default)]
pub struct ContentFile {
    pub path: String,
    pub header: Header,
    /// Logical type: file name without the matched extension.
    pub template: String,
    pub extension: String,
    pub modified: i64,
}

/// Capability the tree builder needs from a backing store.
pub trait DocumentSource {
    /// Key of the tree root.
    fn root(&self) -> &str;

    /// Entries of `dir`, sorted by name.
    fn list(&self, dir: &str) -> Result<Vec<SourceEntry>>;

    /// Read the content file `entry`, matched with `extension`.
    fn read_content(&self, entry: &SourceEntry, extension: &str) -> Result<ContentFile>;

    /// Storage-change signal for the cache digest.
    fn storage_signal(&self, method: CheckMethod) -> Result<String>;

    /// Snapshot schema tag; a snapshot with another tag is never reused.
    fn format_version(&self) -> &'static str;

    /// Whether collections over this source support the full algebra.
    fn is_delegated(&self) -> bool {
        false
    }
}

// ============================================================================
// Storage Abstraction
// ============================================================================

/// Entry returned by [`Storage::list_dir`].
#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub name: String,
    pub is_dir: bool,
    pub modified: i64,
}

/// File found by [`Storage::walk`].
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub modified: i64,
}

/// Narrow filesystem interface used by [`StorageSource`].
pub trait Storage: Send + Sync {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>>;
    fn modified(&self, path: &Path) -> Result<i64>;
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    /// All entries below `root`, depth-first, excluding `root` itself.
    fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>>;
    /// Resolve a logical stream (`page://`) to a concrete path.
    fn locate(&self, stream: &str) -> Option<PathBuf>;
}

/// [`Storage`] backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct LocalStorage {
    streams: BTreeMap<String, PathBuf>,
}

impl LocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scheme://` as an alias of `path`.
    pub fn with_stream(mut self, scheme: &str, path: impl Into<PathBuf>) -> Self {
        self.streams.insert(scheme.to_owned(), path.into());
        self
    }
}

fn mtime(meta: &fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs() as i64)
}

impl Storage for LocalStorage {
    fn list_dir(&self, dir: &Path) -> Result<Vec<StorageEntry>> {
        let mut entries = Vec::new();
        let reader =
            fs::read_dir(dir).with_context(|| format!("cannot list `{}`", dir.display()))?;
        for entry in reader {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(StorageEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                modified: mtime(&meta),
            });
        }
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> Result<i64> {
        let meta = fs::metadata(path).with_context(|| format!("cannot stat `{}`", path.display()))?;
        Ok(mtime(&meta))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("cannot read `{}`", path.display()))
    }

    fn walk(&self, root: &Path) -> Result<Vec<WalkEntry>> {
        let mut out = Vec::new();
        for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            let meta = entry.metadata()?;
            out.push(WalkEntry {
                path: entry.into_path(),
                is_dir: meta.is_dir(),
                modified: mtime(&meta),
            });
        }
        Ok(out)
    }

    fn locate(&self, stream: &str) -> Option<PathBuf> {
        let (scheme, rest) = stream.split_once("://")?;
        let base = self.streams.get(scheme)?;
        Some(if rest.is_empty() { base.clone() } else { base.join(rest) })
    }
}

// ============================================================================
// Storage-backed Producer
// ============================================================================

/// Directory-walking [`DocumentSource`] over any [`Storage`].
pub struct StorageSource<S: Storage> {
    storage: S,
    root: String,
}

impl StorageSource<LocalStorage> {
    /// Local filesystem source rooted at `root`, also reachable as `page://`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self::new(LocalStorage::new().with_stream("page", &root), &root)
    }
}

impl<S: Storage> StorageSource<S> {
    pub fn new(storage: S, root: &Path) -> Self {
        let root = root.to_string_lossy().trim_end_matches('/').to_owned();
        Self { storage, root }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn root_path(&self) -> PathBuf {
        self.storage
            .locate("page://")
            .unwrap_or_else(|| PathBuf::from(&self.root))
    }

    /// mtime of the newest entry (files or folders) below the root.
    fn newest(&self, dirs: bool) -> Result<i64> {
        let root = self.root_path();
        let own = if dirs { self.storage.modified(&root)? } else { 0 };
        Ok(self
            .storage
            .walk(&root)?
            .into_iter()
            .filter(|e| e.is_dir == dirs)
            .map(|e| e.modified)
            .fold(own, i64::max))
    }

    /// Combined content hash of every file below the root.
    fn hash_all(&self) -> Result<String> {
        let root = self.root_path();
        let files: Vec<PathBuf> = self
            .storage
            .walk(&root)?
            .into_iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.path)
            .collect();

        let hashes: Vec<(String, String)> = files
            .par_iter()
            .map(|path| {
                let bytes = self.storage.read(path)?;
                Ok((path.to_string_lossy().into_owned(), hash_bytes(&bytes)))
            })
            .collect::<Result<_>>()?;

        Ok(hashes
            .iter()
            .fold(Digest::new(), |d, (path, hash)| d.part(path).part(hash))
            .hex())
    }
}

impl<S: Storage> DocumentSource for StorageSource<S> {
    fn root(&self) -> &str {
        &self.root
    }

    fn list(&self, dir: &str) -> Result<Vec<SourceEntry>> {
        let mut entries: Vec<SourceEntry> = self
            .storage
            .list_dir(Path::new(dir))?
            .into_iter()
            .map(|e| SourceEntry {
                path: format!("{dir}/{}", e.name),
                name: e.name,
                is_dir: e.is_dir,
                modified: e.modified,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_content(&self, entry: &SourceEntry, extension: &str) -> Result<ContentFile> {
        let bytes = self.storage.read(Path::new(&entry.path))?;
        let text = String::from_utf8_lossy(&bytes);
        let (header, _body) = Header::parse_front_matter(&text)
            .with_context(|| format!("in `{}`", entry.path))?;

        Ok(ContentFile {
            path: entry.path.clone(),
            header,
            template: entry
                .name
                .strip_suffix(extension)
                .unwrap_or(&entry.name)
                .to_owned(),
            extension: extension.to_owned(),
            modified: entry.modified,
        })
    }

    fn storage_signal(&self, method: CheckMethod) -> Result<String> {
        Ok(match method {
            CheckMethod::None => "0".to_owned(),
            CheckMethod::File => self.newest(false)?.to_string(),
            CheckMethod::Folder => self.newest(true)?.to_string(),
            CheckMethod::Hash => self.hash_all()?,
        })
    }

    fn format_version(&self) -> &'static str {
        PAGE_FORMAT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use tempfile::TempDir;

    fn touch(path: &Path, text: &str, mtime: i64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    #[test]
    fn test_list_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b/item.md"), "", 100);
        touch(&dir.path().join("a/item.md"), "", 100);
        touch(&dir.path().join("c.txt"), "", 100);

        let source = StorageSource::local(dir.path());
        let names: Vec<_> = source
            .list(source.root())
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        assert_eq!(
            names,
            vec![("a".into(), true), ("b".into(), true), ("c.txt".into(), false)]
        );
    }

    #[test]
    fn test_read_content() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("blog/blog.en.md"), "---\ntitle: Blog\n---\n", 500);

        let source = StorageSource::local(dir.path());
        let blog = format!("{}/blog", source.root());
        let entry = source.list(&blog).unwrap().remove(0);
        let content = source.read_content(&entry, ".en.md").unwrap();

        assert_eq!(content.template, "blog");
        assert_eq!(content.extension, ".en.md");
        assert_eq!(content.modified, 500);
        assert_eq!(content.header.get_str("title").as_deref(), Some("Blog"));
    }

    #[test]
    fn test_storage_signal_file_and_none() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/item.md");
        touch(&file, "x", 1_000);
        touch(&dir.path().join("b/item.md"), "x", 2_000);

        let source = StorageSource::local(dir.path());
        assert_eq!(source.storage_signal(CheckMethod::File).unwrap(), "2000");
        assert_eq!(source.storage_signal(CheckMethod::None).unwrap(), "0");

        set_file_mtime(&file, FileTime::from_unix_time(3_000, 0)).unwrap();
        assert_eq!(source.storage_signal(CheckMethod::File).unwrap(), "3000");
        assert_eq!(source.storage_signal(CheckMethod::None).unwrap(), "0");
    }

    #[test]
    fn test_storage_signal_folder() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/item.md"), "x", 1_000);
        set_file_mtime(dir.path().join("a"), FileTime::from_unix_time(4_000, 0)).unwrap();
        set_file_mtime(dir.path(), FileTime::from_unix_time(10, 0)).unwrap();

        let source = StorageSource::local(dir.path());
        assert_eq!(source.storage_signal(CheckMethod::Folder).unwrap(), "4000");
    }

    #[test]
    fn test_storage_signal_hash_tracks_content() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a/item.md");
        touch(&file, "one", 1_000);

        let source = StorageSource::local(dir.path());
        let before = source.storage_signal(CheckMethod::Hash).unwrap();
        assert_eq!(before, source.storage_signal(CheckMethod::Hash).unwrap());

        // same mtime, different bytes
        touch(&file, "two", 1_000);
        assert_ne!(before, source.storage_signal(CheckMethod::Hash).unwrap());
    }

    #[test]
    fn test_locate_stream() {
        let storage = LocalStorage::new().with_stream("page", "/srv/pages");
        assert_eq!(storage.locate("page://"), Some(PathBuf::from("/srv/pages")));
        assert_eq!(
            storage.locate("page://blog"),
            Some(PathBuf::from("/srv/pages/blog"))
        );
        assert_eq!(storage.locate("theme://"), None);
        assert_eq!(storage.locate("plain"), None);
    }
}
