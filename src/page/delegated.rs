//! Adapter for an external object store acting as the page backend.
//!
//! The store exposes a flat index of objects keyed by storage path. The
//! adapter rebuilds the directory shape from those paths so the regular
//! tree builder can walk it:
//!
//! - each object with a translation for the active language becomes a
//!   directory entry under `dirname(path)`, holding one virtual content file
//!   named `<template><extension>`
//! - objects without a translation are left out, and so is their subtree
//!   (their children are never reached from the root)
//! - the store's own checksum replaces the storage scan for cache digests

use super::header::Header;
use super::source::{ContentFile, DocumentSource, SourceEntry};
use crate::config::CheckMethod;
use anyhow::{Result, anyhow};
use std::collections::BTreeMap;

/// Snapshot schema of delegated-store indexes.
pub const DELEGATED_FORMAT: &str = "flex-v1";

/// Localized content of one store object.
#[derive(Debug, Clone, Default)]
pub struct StoreDocument {
    pub template: String,
    pub header: Header,
    pub modified: i64,
}

/// One object of the external store.
pub trait StoreObject {
    fn path(&self) -> &str;
    fn slug(&self) -> &str;
    fn has_translation(&self, lang: &str) -> bool;
    fn translation(&self, lang: &str) -> Option<StoreDocument>;
}

/// The external store itself.
pub trait DelegatedStore {
    /// Every object, keyed by store key.
    fn index(&self) -> Vec<(String, &dyn StoreObject)>;
    /// Changes whenever any object changes.
    fn cache_checksum(&self) -> String;
}

/// [`DocumentSource`] over a [`DelegatedStore`].
pub struct DelegatedSource {
    root: String,
    checksum: String,
    dirs: BTreeMap<String, Vec<SourceEntry>>,
    documents: BTreeMap<String, StoreDocument>,
}

impl DelegatedSource {
    /// Snapshot the store index for `lang`; `extension` names the virtual
    /// content files and must be one of the accepted page extensions.
    pub fn new(store: &dyn DelegatedStore, root: &str, lang: &str, extension: &str) -> Self {
        let root = root.trim_end_matches('/').to_owned();
        let mut dirs: BTreeMap<String, Vec<SourceEntry>> = BTreeMap::new();
        let mut documents = BTreeMap::new();

        for (_key, object) in store.index() {
            let path = object.path().trim_end_matches('/');
            if path == root || !object.has_translation(lang) {
                continue;
            }
            let Some(doc) = object.translation(lang) else {
                continue;
            };
            let (parent, base) = path.rsplit_once('/').unwrap_or(("", path));
            let name = match object.slug() {
                "" => base.to_owned(),
                slug => slug.to_owned(),
            };

            dirs.entry(path.to_owned()).or_default().push(SourceEntry {
                name: format!("{}{extension}", doc.template),
                path: format!("{path}/{}{extension}", doc.template),
                is_dir: false,
                modified: doc.modified,
            });
            dirs.entry(parent.to_owned()).or_default().push(SourceEntry {
                name,
                path: path.to_owned(),
                is_dir: true,
                modified: doc.modified,
            });
            documents.insert(path.to_owned(), doc);
        }

        for entries in dirs.values_mut() {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }

        Self {
            root,
            checksum: store.cache_checksum(),
            dirs,
            documents,
        }
    }
}

impl DocumentSource for DelegatedSource {
    fn root(&self) -> &str {
        &self.root
    }

    fn list(&self, dir: &str) -> Result<Vec<SourceEntry>> {
        Ok(self.dirs.get(dir).cloned().unwrap_or_default())
    }

    fn read_content(&self, entry: &SourceEntry, extension: &str) -> Result<ContentFile> {
        let dir = entry
            .path
            .rsplit_once('/')
            .map_or("", |(dir, _)| dir);
        let doc = self
            .documents
            .get(dir)
            .ok_or_else(|| anyhow!("no store object for `{}`", entry.path))?;

        Ok(ContentFile {
            path: entry.path.clone(),
            header: doc.header.clone(),
            template: doc.template.clone(),
            extension: extension.to_owned(),
            modified: doc.modified,
        })
    }

    fn storage_signal(&self, _method: CheckMethod) -> Result<String> {
        Ok(self.checksum.clone())
    }

    fn format_version(&self) -> &'static str {
        DELEGATED_FORMAT
    }

    fn is_delegated(&self) -> bool {
        true
    }
}
