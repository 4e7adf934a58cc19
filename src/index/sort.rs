//! Sort engine.
//!
//! Orders sibling pages by one field and memoizes the result per
//! `(container, field)`:
//!
//! ```text
//! children ──▶ extract key ──▶ stable compare ──▶ manual merge ──▶ table
//!                                                                   │
//!                                           read: reverse if desc ◀─┘
//! ```
//!
//! Direction is applied on read, so one table entry serves both `asc` and
//! `desc`. `random` is never memoized.

use super::{ChildEntry, Instances, error::IndexError};
use crate::log;
use crate::page::{Document, header::value_to_sort_key};
use crate::utils::{hash::Digest, natural};
use anyhow::{Result, bail};
use bitflags::bitflags;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Memo table: container key → field key → ascending order.
pub type SortTable = BTreeMap<String, BTreeMap<String, Vec<ChildEntry>>>;

bitflags! {
    /// Comparison flags, combinable like `NATURAL | FLAG_CASE`.
    ///
    /// The low bits select a mode (`LOCALE_STRING` and `NATURAL` are
    /// multi-bit values), `FLAG_CASE` folds case for string modes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SortFlags: u32 {
        const REGULAR = 0;
        const NUMERIC = 1;
        const STRING = 2;
        const LOCALE_STRING = 5;
        const NATURAL = 6;
        const FLAG_CASE = 8;
    }
}

impl SortFlags {
    /// Combine symbolic names such as `SORT_NATURAL` or `flag_case`.
    ///
    /// Unknown names are logged and ignored.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().fold(Self::empty(), |acc, name| {
            let upper = name.as_ref().trim().to_ascii_uppercase();
            let bare = upper.strip_prefix("SORT_").unwrap_or(&upper);
            match Self::from_name(bare) {
                Some(flag) => acc | flag,
                None => {
                    log!("sort"; "unknown sort flag `{}`", name.as_ref());
                    acc
                }
            }
        })
    }

    fn mode(self) -> u32 {
        self.bits() & !Self::FLAG_CASE.bits()
    }

    fn fold_case(self) -> bool {
        self.contains(Self::FLAG_CASE)
    }
}

// ============================================================================
// Order Fields
// ============================================================================

/// What siblings are ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderField {
    /// Storage path, i.e. discovery order.
    Default,
    /// Storage path, with the page's manual list in front.
    Manual,
    Random,
    Title,
    Date,
    Modified,
    PublishDate,
    UnpublishDate,
    Slug,
    Basename,
    Folder,
    /// `header.<dotted.path>` with an optional `|default`.
    Header {
        field: String,
        default: Option<String>,
    },
}

impl OrderField {
    /// Parse an `order.by` value. Unknown names order by path.
    pub fn parse(by: &str) -> Self {
        match by.trim() {
            "manual" => Self::Manual,
            "random" => Self::Random,
            "title" => Self::Title,
            "date" => Self::Date,
            "modified" => Self::Modified,
            "publish_date" => Self::PublishDate,
            "unpublish_date" => Self::UnpublishDate,
            "slug" => Self::Slug,
            "basename" => Self::Basename,
            "folder" => Self::Folder,
            other => match other.strip_prefix("header.") {
                Some(rest) if !rest.is_empty() => {
                    let (field, default) = match rest.split_once('|') {
                        Some((field, default)) => (field, Some(default.to_owned())),
                        None => (rest, None),
                    };
                    Self::Header {
                        field: field.to_owned(),
                        default,
                    }
                }
                _ => Self::Default,
            },
        }
    }

    fn is_date(&self) -> bool {
        matches!(
            self,
            Self::Date | Self::Modified | Self::PublishDate | Self::UnpublishDate
        )
    }

    /// Flags used when the caller supplies none.
    fn default_flags(&self) -> SortFlags {
        match self {
            Self::Default | Self::Manual | Self::Random => SortFlags::REGULAR,
            _ => SortFlags::NATURAL | SortFlags::FLAG_CASE,
        }
    }

    fn key(&self, doc: &Document) -> SortKey {
        match self {
            Self::Title => SortKey::Text(doc.title.clone()),
            Self::Date => SortKey::Int(doc.date()),
            Self::Modified => SortKey::Int(doc.modified),
            Self::PublishDate => SortKey::Int(doc.publish_date.unwrap_or(0)),
            Self::UnpublishDate => SortKey::Int(doc.unpublish_date.unwrap_or(0)),
            Self::Slug => SortKey::Text(doc.slug.clone()),
            Self::Basename | Self::Folder => SortKey::Text(doc.folder.clone()),
            Self::Header { field, default } => SortKey::Text(
                doc.header
                    .get(field)
                    .and_then(value_to_sort_key)
                    .or_else(|| default.clone())
                    .unwrap_or_else(|| doc.path.clone()),
            ),
            Self::Default | Self::Manual | Self::Random => SortKey::Text(doc.path.clone()),
        }
    }
}

enum SortKey {
    Int(i64),
    Text(String),
}

impl SortKey {
    fn text(&self) -> Cow<'_, str> {
        match self {
            Self::Int(v) => Cow::Owned(v.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }
}

// ============================================================================
// Comparison
// ============================================================================

/// Compare two string keys under `flags`.
///
/// With `collate`, string modes compare transliterated, case-folded keys
/// (digit runs zero-padded for `NATURAL`), ties broken by the raw strings.
pub fn compare_text(a: &str, b: &str, flags: SortFlags, collate: bool) -> Ordering {
    let mode = flags.mode();
    let numeric = || match (natural::numeric_value(a), natural::numeric_value(b)) {
        (Some(x), Some(y)) => Some(x.total_cmp(&y)),
        _ => None,
    };

    if collate && mode != SortFlags::NUMERIC.bits() {
        if mode == SortFlags::REGULAR.bits()
            && let Some(ord) = numeric()
        {
            return ord;
        }
        let natural = mode == SortFlags::NATURAL.bits();
        return natural::collation_key(a, natural)
            .cmp(&natural::collation_key(b, natural))
            .then_with(|| a.cmp(b));
    }

    match mode {
        m if m == SortFlags::NUMERIC.bits() => natural::numeric_value(a)
            .unwrap_or(0.0)
            .total_cmp(&natural::numeric_value(b).unwrap_or(0.0)),
        m if m == SortFlags::STRING.bits() => {
            if flags.fold_case() {
                a.to_lowercase().cmp(&b.to_lowercase())
            } else {
                a.cmp(b)
            }
        }
        m if m == SortFlags::LOCALE_STRING.bits() => natural::collation_key(a, false)
            .cmp(&natural::collation_key(b, false))
            .then_with(|| a.cmp(b)),
        m if m == SortFlags::NATURAL.bits() => natural::natural_cmp(a, b, flags.fold_case()),
        _ => numeric().unwrap_or_else(|| a.cmp(b)),
    }
}

fn compare(a: &SortKey, b: &SortKey, flags: SortFlags, collate: bool) -> Ordering {
    match (a, b) {
        (SortKey::Int(x), SortKey::Int(y)) => x.cmp(y),
        _ => compare_text(&a.text(), &b.text(), flags, collate),
    }
}

/// Move entries whose slug is listed in `manual` to the front, in list
/// order. Everything else keeps its relative order.
pub fn merge_manual(items: Vec<ChildEntry>, manual: &[String]) -> Vec<ChildEntry> {
    if manual.is_empty() {
        return items;
    }
    let tail = manual.len();
    let mut ranked: Vec<(usize, ChildEntry)> = items
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let rank = manual
                .iter()
                .position(|slug| *slug == entry.slug)
                .unwrap_or(tail + i);
            (rank, entry)
        })
        .collect();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, entry)| entry).collect()
}

/// Whether `dir` asks for descending order.
pub fn is_descending(dir: &str) -> bool {
    dir.trim().eq_ignore_ascii_case("desc")
}

/// Apply a direction to an ascending sequence.
pub fn directed(mut items: Vec<ChildEntry>, dir: &str) -> Vec<ChildEntry> {
    if is_descending(dir) {
        items.reverse();
    }
    items
}

/// Per-process value mixed into random orderings.
fn session_nonce() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!("{nanos}:{}", COUNTER.fetch_add(1, AtomicOrdering::Relaxed))
}

/// Shuffle by digest of `nonce` and each path.
pub fn shuffle(mut items: Vec<ChildEntry>) -> Vec<ChildEntry> {
    let nonce = session_nonce();
    items.sort_by_cached_key(|entry| Digest::new().part(&nonce).part(&entry.path).short());
    items
}

// ============================================================================
// Sorter
// ============================================================================

/// Orders children against one instance map.
pub struct Sorter<'a> {
    instances: &'a Instances,
    collate: bool,
}

impl<'a> Sorter<'a> {
    pub fn new(instances: &'a Instances, collate: bool) -> Self {
        Self { instances, collate }
    }

    /// Ascending order of `items` by `field`, then the manual merge.
    ///
    /// Every item must be indexed; `container` names the owner in errors.
    pub fn order(
        &self,
        container: &str,
        items: &[ChildEntry],
        field: &OrderField,
        manual: &[String],
        flags: Option<SortFlags>,
    ) -> Result<Vec<ChildEntry>> {
        let mut keyed = Vec::with_capacity(items.len());
        for entry in items {
            let Some(doc) = self.instances.get(&entry.path) else {
                bail!(IndexError::MissingChild {
                    container: container.to_owned(),
                    child: entry.path.clone(),
                });
            };
            keyed.push((field.key(doc), entry.clone()));
        }

        let sorted: Vec<ChildEntry> = if *field == OrderField::Random {
            shuffle(keyed.into_iter().map(|(_, entry)| entry).collect())
        } else {
            let flags = if field.is_date() {
                SortFlags::REGULAR
            } else {
                flags.unwrap_or_else(|| field.default_flags())
            };
            keyed.sort_by(|(a, _), (b, _)| compare(a, b, flags, self.collate));
            keyed.into_iter().map(|(_, entry)| entry).collect()
        };

        Ok(merge_manual(sorted, manual))
    }
}

/// Memo key of a field plus explicit flags.
pub fn field_key(by: &str, flags: Option<SortFlags>) -> String {
    match flags {
        Some(flags) => format!("{by}|{}", flags.bits()),
        None => by.to_owned(),
    }
}

/// Memo key of an ad-hoc item list.
pub fn collection_key(items: &[ChildEntry], manual: &[String], by: &str) -> String {
    Digest::new()
        .part("collection")
        .parts(items.iter().map(|e| &e.path))
        .part("manual")
        .parts(manual)
        .part(by)
        .hex()
}

// ============================================================================
// Memo Table
// ============================================================================

/// Shared sort memo. Reads take a shared lock; a miss computes outside
/// any lock and inserts under a write lock.
#[derive(Debug, Default)]
pub struct SortCache {
    table: RwLock<SortTable>,
}

impl SortCache {
    pub fn new(table: SortTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    pub fn get(&self, container: &str, field: &str) -> Option<Vec<ChildEntry>> {
        self.table.read().get(container)?.get(field).cloned()
    }

    pub fn insert(&self, container: &str, field: &str, order: Vec<ChildEntry>) {
        self.table
            .write()
            .entry(container.to_owned())
            .or_default()
            .insert(field.to_owned(), order);
    }

    /// Cached order, or `build` it and remember the result.
    pub fn get_or_try_insert(
        &self,
        container: &str,
        field: &str,
        build: impl FnOnce() -> Result<Vec<ChildEntry>>,
    ) -> Result<Vec<ChildEntry>> {
        if let Some(hit) = self.get(container, field) {
            return Ok(hit);
        }
        let order = build()?;
        self.insert(container, field, order.clone());
        Ok(order)
    }

    /// Copy of the whole table, for snapshots.
    pub fn table(&self) -> SortTable {
        self.table.read().clone()
    }

    pub fn len(&self) -> usize {
        self.table.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
