//! Tree builder: one depth-first pass over a [`DocumentSource`].
//!
//! For every directory:
//!
//! 1. list entries, dropping ignored files/folders and hidden names
//! 2. pick the content file whose extension ranks first
//! 3. recurse into sub-directories (folders containing the parameter
//!    separator are not pages)
//! 4. content-less folders become non-routable
//! 5. `modified` = newest file, plus children for the modular template
//! 6. sort the children once with the page's own order settings

use super::sort::{OrderField, SortTable, Sorter, field_key};
use super::{ChildEntry, ChildrenMap, Instances, error::IndexError};
use crate::config::SiteConfig;
use crate::log;
use crate::page::Document;
use crate::page::source::{ContentFile, DocumentSource, SourceEntry};
use anyhow::{Result, bail};
use regex::Regex;

/// Everything one build produces.
#[derive(Debug, Default)]
pub struct BuiltTree {
    pub root: String,
    pub instances: Instances,
    /// Children in discovery order.
    pub children: ChildrenMap,
    /// Each container's children under its own order field.
    pub sort: SortTable,
    pub last_modified: i64,
}

pub struct TreeBuilder<'a> {
    source: &'a dyn DocumentSource,
    config: &'a SiteConfig,
    extensions: Vec<String>,
    content_re: Regex,
    collate: bool,
    now: i64,
    injected: Vec<Document>,
    tree: BuiltTree,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(source: &'a dyn DocumentSource, config: &'a SiteConfig) -> Result<Self> {
        let extensions = config.page_extensions();
        let alternation = extensions
            .iter()
            .map(|ext| regex::escape(ext))
            .collect::<Vec<_>>()
            .join("|");
        let content_re = Regex::new(&format!("^[^.]*({alternation})$"))?;

        Ok(Self {
            source,
            config,
            extensions,
            content_re,
            collate: config.pages.intl_enabled && !config.pages.locale.is_empty(),
            now: chrono::Utc::now().timestamp(),
            injected: Vec::new(),
            tree: BuiltTree::default(),
        })
    }

    /// Evaluate publishing windows against `now` instead of the clock.
    pub fn at(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    /// Pages supplied from outside the source, merged after the walk.
    ///
    /// Each must name an indexed parent; a path already discovered is fatal.
    pub fn with_pages(mut self, pages: Vec<Document>) -> Self {
        self.injected = pages;
        self
    }

    pub fn build(mut self) -> Result<BuiltTree> {
        let root_path = self.source.root().to_owned();
        self.tree.root = root_path.clone();

        let root = self.recurse(&root_path, "", None)?;
        self.insert(root)?;

        for page in std::mem::take(&mut self.injected) {
            self.inject(page)?;
        }

        self.tree.last_modified = self
            .tree
            .instances
            .values()
            .map(|doc| doc.modified)
            .max()
            .unwrap_or(0);

        log!("pages"; "indexed {} pages under {}", self.tree.instances.len(), self.tree.root);
        Ok(self.tree)
    }

    fn recurse(&mut self, dir: &str, folder: &str, parent: Option<&Document>) -> Result<Document> {
        let mut page = match parent {
            Some(parent) => Document::new(dir, folder, parent, self.config),
            None => Document::new_root(dir, self.config),
        };

        let entries = self.source.list(dir)?;
        let mut content: Option<(usize, &SourceEntry)> = None;
        let mut folders = Vec::new();
        let mut last_modified = 0;

        for entry in &entries {
            if self.is_ignored(entry) {
                continue;
            }
            if entry.is_dir {
                folders.push(entry);
                continue;
            }
            last_modified = last_modified.max(entry.modified);
            if let Some(rank) = self.content_rank(&entry.name)
                && content.is_none_or(|(best, _)| rank < best)
            {
                content = Some((rank, entry));
            }
        }

        if let Some(parent) = parent {
            if let Some((rank, entry)) = content {
                let file = self.read_content(entry, rank);
                page.apply_content(file, self.config, self.now);
            }
            page.assign_routes(&parent.route, &parent.raw_route);
        }

        let mut children = Vec::new();
        for entry in folders {
            let mut child = self.recurse(&entry.path, &entry.name, Some(&page))?;
            if entry.name.starts_with(&self.config.pages.hide_marker) {
                child.routable = false;
            }
            children.push(ChildEntry {
                path: child.path.clone(),
                slug: child.slug.clone(),
            });
            self.insert(child)?;
        }

        if page.file.is_none() {
            page.routable = false;
            if self.config.pages.hide_empty_folders {
                page.visible = false;
            }
        }

        if page.template == self.config.pages.modular_template {
            last_modified = children
                .iter()
                .filter_map(|c| self.tree.instances.get(&c.path))
                .map(|c| c.modified)
                .fold(last_modified, i64::max);
        }
        page.set_modified(last_modified);

        if !children.is_empty() {
            self.tree.children.insert(page.path.clone(), children);
            self.sort_children(&page)?;
        }

        Ok(page)
    }

    /// Read the selected content file. A broken file keeps its page, with
    /// an empty header.
    fn read_content(&self, entry: &SourceEntry, rank: usize) -> ContentFile {
        let extension = &self.extensions[rank];
        self.source
            .read_content(entry, extension)
            .unwrap_or_else(|err| {
                log!("error"; "{}: {err:#}", entry.path);
                ContentFile {
                    path: entry.path.clone(),
                    template: entry
                        .name
                        .strip_suffix(extension.as_str())
                        .unwrap_or(&entry.name)
                        .to_owned(),
                    extension: extension.clone(),
                    modified: entry.modified,
                    ..Default::default()
                }
            })
    }

    fn is_ignored(&self, entry: &SourceEntry) -> bool {
        let pages = &self.config.pages;
        if pages.ignore_hidden
            && !pages.hidden_marker.is_empty()
            && entry.name.starts_with(&pages.hidden_marker)
        {
            return true;
        }
        if entry.is_dir {
            pages.ignore_folders.contains(&entry.name) || entry.name.contains(&pages.param_sep)
        } else {
            pages.ignore_files.contains(&entry.name)
        }
    }

    /// Priority of a content file name (lower wins), `None` if not content.
    fn content_rank(&self, name: &str) -> Option<usize> {
        let caps = self.content_re.captures(name)?;
        let ext = caps.get(1)?.as_str();
        self.extensions.iter().position(|e| e == ext)
    }

    fn sort_children(&mut self, page: &Document) -> Result<()> {
        let Some(children) = self.tree.children.get(&page.path) else {
            return Ok(());
        };
        let field = OrderField::parse(&page.order_by);
        if field == OrderField::Random {
            return Ok(());
        }

        let order = Sorter::new(&self.tree.instances, self.collate).order(
            &page.path,
            children,
            &field,
            &page.order_manual,
            None,
        )?;
        let table = self.tree.sort.entry(page.path.clone()).or_default();
        table.clear();
        table.insert(field_key(&page.order_by, None), order);
        Ok(())
    }

    fn insert(&mut self, doc: Document) -> Result<()> {
        if self.tree.instances.contains_key(&doc.path) {
            bail!(IndexError::DuplicatePath(doc.path));
        }
        self.tree.instances.insert(doc.path.clone(), doc);
        Ok(())
    }

    fn inject(&mut self, page: Document) -> Result<()> {
        let Some(parent) = page
            .parent
            .as_ref()
            .and_then(|p| self.tree.instances.get(p))
            .cloned()
        else {
            bail!(IndexError::Source(format!(
                "page `{}` has no indexed parent",
                page.path
            )));
        };

        let entry = ChildEntry {
            path: page.path.clone(),
            slug: page.slug.clone(),
        };
        self.insert(page)?;
        self.tree
            .children
            .entry(parent.path.clone())
            .or_default()
            .push(entry);
        self.sort_children(&parent)
    }
}
