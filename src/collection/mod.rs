//! Collections: ordered views over pages of one index.
//!
//! A collection holds page keys plus the parameters it was built from.
//! Every operation returns a new collection; the index is only read.
//!
//! Collections over a delegated store support filtering and navigation but
//! not the set algebra (`merge`, `intersect`, `append`, `batch`, `order`),
//! which fail with [`CollectionError::NotImplemented`].

mod filter;
pub mod params;
pub mod query;

pub use params::{CollectionParams, DateRange, Filters, OrderSpec};
pub use query::{ItemSource, QueryContext, Relation, Scope};

use crate::index::{ChildEntry, PageIndex, SortFlags, sort};
use crate::page::Document;
use anyhow::{Result, bail};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("`{0}` is not implemented for delegated collections")]
    NotImplemented(&'static str),
}

#[derive(Clone)]
pub struct Collection<'i> {
    index: &'i PageIndex,
    items: Vec<ChildEntry>,
    params: CollectionParams,
}

impl std::fmt::Debug for Collection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("items", &self.items)
            .field("params", &self.params)
            .finish()
    }
}

impl<'i> Collection<'i> {
    pub fn new(index: &'i PageIndex, items: Vec<ChildEntry>) -> Self {
        Self {
            index,
            items,
            params: CollectionParams::default(),
        }
    }

    pub fn with_params(mut self, params: CollectionParams) -> Self {
        self.params = params;
        self
    }

    fn with_items(&self, items: Vec<ChildEntry>) -> Self {
        Self {
            index: self.index,
            items,
            params: self.params.clone(),
        }
    }

    fn supported(&self, operation: &'static str) -> Result<()> {
        if self.index.is_delegated() {
            bail!(CollectionError::NotImplemented(operation));
        }
        Ok(())
    }

    // ========================================================================
    // Access
    // ========================================================================

    pub fn params(&self) -> &CollectionParams {
        &self.params
    }

    pub fn items(&self) -> &[ChildEntry] {
        &self.items
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|e| e.path.as_str())
    }

    /// Pages in collection order.
    pub fn pages(&self) -> impl Iterator<Item = &'i Document> + '_ {
        let index = self.index;
        self.items.iter().filter_map(move |e| index.get(&e.path))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.items.iter().any(|e| e.path == path)
    }

    pub fn nth(&self, n: usize) -> Option<&'i Document> {
        self.items.get(n).and_then(|e| self.index.get(&e.path))
    }

    pub fn first(&self) -> Option<&'i Document> {
        self.nth(0)
    }

    pub fn last(&self) -> Option<&'i Document> {
        self.items.len().checked_sub(1).and_then(|n| self.nth(n))
    }

    /// Route → path of every page.
    pub fn to_routes(&self) -> BTreeMap<String, String> {
        self.pages()
            .map(|doc| (doc.route.clone(), doc.path.clone()))
            .collect()
    }

    // ========================================================================
    // Algebra
    // ========================================================================

    /// Without the page at `path`.
    pub fn remove(&self, path: &str) -> Self {
        self.with_items(self.items.iter().filter(|e| e.path != path).cloned().collect())
    }

    /// Contiguous subrange, clamped to the collection.
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        self.with_items(self.items.iter().skip(offset).take(length).cloned().collect())
    }

    /// Union keeping each page at its first position.
    pub(crate) fn union(&self, other: Collection<'_>) -> Self {
        let mut seen: BTreeSet<String> = self.items.iter().map(|e| e.path.clone()).collect();
        let mut items = self.items.clone();
        for entry in other.items {
            if seen.insert(entry.path.clone()) {
                items.push(entry);
            }
        }
        self.with_items(items)
    }

    /// Items of `other` added after these; a page already present keeps
    /// its place and takes the other collection's entry.
    pub fn append(&self, other: &Collection<'_>) -> Result<Self> {
        self.supported("append")?;
        let mut items = self.items.clone();
        for entry in &other.items {
            match items.iter_mut().find(|e| e.path == entry.path) {
                Some(existing) => *existing = entry.clone(),
                None => items.push(entry.clone()),
            }
        }
        Ok(self.with_items(items))
    }

    pub fn merge(&self, other: &Collection<'_>) -> Result<Self> {
        self.supported("merge")?;
        self.append(other)
    }

    /// Pages present in both, in this collection's order.
    pub fn intersect(&self, other: &Collection<'_>) -> Result<Self> {
        self.supported("intersect")?;
        let keep: BTreeSet<&str> = other.paths().collect();
        Ok(self.with_items(
            self.items
                .iter()
                .filter(|e| keep.contains(e.path.as_str()))
                .cloned()
                .collect(),
        ))
    }

    /// Split into chunks of `size` pages.
    pub fn batch(&self, size: usize) -> Result<Vec<Self>> {
        self.supported("batch")?;
        Ok(self
            .items
            .chunks(size.max(1))
            .map(|chunk| self.with_items(chunk.to_vec()))
            .collect())
    }

    pub fn reverse(&self) -> Self {
        self.with_items(self.items.iter().rev().cloned().collect())
    }

    pub fn shuffle(&self) -> Self {
        self.with_items(sort::shuffle(self.items.clone()))
    }

    /// Up to `count` pages in random order.
    pub fn random(&self, count: usize) -> Self {
        let mut shuffled = sort::shuffle(self.items.clone());
        shuffled.truncate(count);
        self.with_items(shuffled)
    }

    /// Reorder by a field through the index's sort memo.
    pub fn order(
        &self,
        by: &str,
        dir: &str,
        manual: &[String],
        flags: Option<SortFlags>,
    ) -> Result<Self> {
        self.supported("order")?;
        let items = self
            .index
            .sort_collection(&self.items, by, dir, manual, flags)?;
        Ok(self.with_items(items))
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn current_position(&self, path: &str) -> Option<usize> {
        self.items.iter().position(|e| e.path == path)
    }

    pub fn is_first(&self, path: &str) -> bool {
        self.items.first().is_some_and(|e| e.path == path)
    }

    pub fn is_last(&self, path: &str) -> bool {
        self.items.last().is_some_and(|e| e.path == path)
    }

    /// Page `direction` steps away from `path`.
    pub fn adjacent_sibling(&self, path: &str, direction: isize) -> Option<&'i Document> {
        let position = self.current_position(path)?;
        let target = position.checked_add_signed(direction)?;
        self.nth(target)
    }

    pub fn prev_sibling(&self, path: &str) -> Option<&'i Document> {
        self.adjacent_sibling(path, -1)
    }

    pub fn next_sibling(&self, path: &str) -> Option<&'i Document> {
        self.adjacent_sibling(path, 1)
    }
}
