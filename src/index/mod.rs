//! The page index: documents, children, routes, taxonomy and sort memo of
//! one page tree.
//!
//! # Lifecycle
//!
//! ```text
//! DocumentSource ──▶ TreeBuilder ──▶ PageIndex::from_tree ──▶ Snapshot
//!                                          ▲                     │
//!                                          └── from_snapshot ◀───┘
//! ```
//!
//! A built index is read-only apart from the sort memo and the init-once
//! home route / page type registries. [`PageService`] republishes a fresh
//! index atomically on reload.

pub mod cache;
pub mod error;
pub mod routes;
pub mod service;
pub mod sort;
pub mod taxonomy;
pub mod tree;

pub use cache::{CacheStatus, FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotStore};
pub use error::IndexError;
pub use routes::{Dispatch, RouteMap};
pub use service::PageService;
pub use sort::{OrderField, SortFlags};
pub use taxonomy::{Operator, TaxonomyMap};

use crate::collection::Collection;
use crate::config::SiteConfig;
use crate::page::Document;
use crate::page::source::DocumentSource;
use anyhow::Result;
use educe::Educe;
use routes::RouteRules;
use serde::{Deserialize, Serialize};
use sort::{SortCache, SortTable, Sorter, collection_key, directed, field_key};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use tree::{BuiltTree, TreeBuilder};

/// Storage path → document.
pub type Instances = BTreeMap<String, Document>;

/// Container path → children in discovery order.
pub type ChildrenMap = BTreeMap<String, Vec<ChildEntry>>;

/// One child reference of a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildEntry {
    pub path: String,
    pub slug: String,
}

/// Templates in use, split by whether they render modular parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTypes {
    pub standard: BTreeSet<String>,
    pub modular: BTreeSet<String>,
}

/// Options of [`PageIndex::list`].
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct ListOptions {
    /// Key entries by raw route instead of route.
    pub raw_routes: bool,
    /// Include non-routable pages.
    #[educe(Default = true)]
    pub show_all: bool,
    /// Include modular pages even when `show_all` is off.
    pub show_modular: bool,
    pub show_slug: bool,
    /// Label entries with their route instead of an indented title.
    pub show_fullpath: bool,
    /// Maximum depth below the root.
    pub limit_levels: Option<usize>,
}

pub struct PageIndex {
    config: Arc<SiteConfig>,
    root: String,
    format_version: String,
    delegated: bool,
    digest: String,

    instances: Instances,
    children: ChildrenMap,
    routes: RouteMap,
    taxonomy: TaxonomyMap,
    sort: SortCache,
    last_modified: i64,

    home_route: OnceLock<String>,
    page_types: OnceLock<PageTypes>,
    rules: OnceLock<RouteRules>,
}

impl PageIndex {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Build from `source` without consulting any snapshot.
    pub fn build(source: &dyn DocumentSource, config: Arc<SiteConfig>) -> Result<Self> {
        let digest = cache::digest(source, &config)?;
        Self::build_with_digest(source, config, digest)
    }

    pub(crate) fn build_with_digest(
        source: &dyn DocumentSource,
        config: Arc<SiteConfig>,
        digest: String,
    ) -> Result<Self> {
        let tree = TreeBuilder::new(source, &config)?.build()?;
        Ok(Self::from_tree(
            tree,
            config,
            source.format_version(),
            source.is_delegated(),
            digest,
        ))
    }

    /// Derive routes and taxonomy from a freshly built tree.
    pub fn from_tree(
        tree: BuiltTree,
        config: Arc<SiteConfig>,
        format_version: &str,
        delegated: bool,
        digest: String,
    ) -> Self {
        let taxonomy = TaxonomyMap::build(&tree.instances, &config.site.taxonomies);
        let mut index = Self::assemble(
            config,
            tree.root,
            format_version.to_owned(),
            delegated,
            digest,
            tree.instances,
            tree.children,
            RouteMap::new(),
            taxonomy,
            tree.sort,
            tree.last_modified,
        );

        let home = index.home_route().to_owned();
        index.routes = routes::build_routes(&index.instances, &home);
        if let Some(path) = index.routes.get("/")
            && let Some(doc) = index.instances.get_mut(path)
        {
            doc.route = "/".to_owned();
        }
        index
    }

    /// Restore a persisted index verbatim.
    pub fn from_snapshot(
        snapshot: Snapshot,
        config: Arc<SiteConfig>,
        digest: String,
        delegated: bool,
    ) -> Self {
        Self::assemble(
            config,
            snapshot.root,
            snapshot.format_version,
            delegated,
            digest,
            snapshot.instances,
            snapshot.children,
            snapshot.routes,
            snapshot.taxonomy,
            snapshot.sort,
            snapshot.last_modified,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        config: Arc<SiteConfig>,
        root: String,
        format_version: String,
        delegated: bool,
        digest: String,
        instances: Instances,
        children: ChildrenMap,
        routes: RouteMap,
        taxonomy: TaxonomyMap,
        sort: SortTable,
        last_modified: i64,
    ) -> Self {
        Self {
            config,
            root,
            format_version,
            delegated,
            digest,
            instances,
            children,
            routes,
            taxonomy,
            sort: SortCache::new(sort),
            last_modified,
            home_route: OnceLock::new(),
            page_types: OnceLock::new(),
            rules: OnceLock::new(),
        }
    }

    /// Persistable copy of the index.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            format_version: self.format_version.clone(),
            root: self.root.clone(),
            instances: self.instances.clone(),
            routes: self.routes.clone(),
            children: self.children.clone(),
            taxonomy: self.taxonomy.clone(),
            sort: self.sort.table(),
            last_modified: self.last_modified,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn get(&self, path: &str) -> Option<&Document> {
        self.instances.get(path)
    }

    /// The tree root.
    pub fn root(&self) -> Option<&Document> {
        self.instances.get(&self.root)
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub fn routes(&self) -> &RouteMap {
        &self.routes
    }

    /// Children in discovery order.
    pub fn children_map(&self) -> &ChildrenMap {
        &self.children
    }

    pub fn taxonomy(&self) -> &TaxonomyMap {
        &self.taxonomy
    }

    pub fn sort_table(&self) -> SortTable {
        self.sort.table()
    }

    pub fn last_modified(&self) -> i64 {
        self.last_modified
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    /// Whether pages come from a delegated store.
    pub fn is_delegated(&self) -> bool {
        self.delegated
    }

    /// Route served at `/`, e.g. `/home`.
    pub fn home_route(&self) -> &str {
        self.home_route
            .get_or_init(|| format!("/{}", self.config.home_alias()))
    }

    /// Templates in use by pages with content.
    pub fn page_types(&self) -> &PageTypes {
        self.page_types.get_or_init(|| {
            let mut types = PageTypes::default();
            for doc in self.instances.values().filter(|doc| doc.file.is_some()) {
                let set = if doc.modular {
                    &mut types.modular
                } else {
                    &mut types.standard
                };
                set.insert(doc.template.clone());
            }
            types
        })
    }

    pub(crate) fn rules(&self) -> &RouteRules {
        self.rules
            .get_or_init(|| RouteRules::compile(&self.config.site))
    }

    /// Every access level declared in a page header.
    pub fn access_levels(&self) -> Vec<String> {
        self.instances
            .values()
            .flat_map(Document::access_levels)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    fn collate(&self) -> bool {
        self.config.pages.intl_enabled && !self.config.pages.locale.is_empty()
    }

    fn parent_of(&self, doc: &Document) -> Option<&Document> {
        doc.parent.as_deref().and_then(|p| self.instances.get(p))
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Children of `path` ordered by `by` in direction `dir`.
    ///
    /// The container's manual list applies. Results are memoized per
    /// `(path, by)`; `random` is recomputed on every call.
    pub fn sort(
        &self,
        path: &str,
        by: &str,
        dir: &str,
        flags: Option<SortFlags>,
    ) -> Result<Vec<ChildEntry>> {
        let Some(children) = self.children.get(path) else {
            return Ok(Vec::new());
        };
        let manual = self
            .instances
            .get(path)
            .map_or(&[][..], |doc| doc.order_manual.as_slice());
        let field = OrderField::parse(by);
        let sorter = Sorter::new(&self.instances, self.collate());

        let order = if field == OrderField::Random {
            sorter.order(path, children, &field, manual, flags)?
        } else {
            self.sort.get_or_try_insert(path, &field_key(by, flags), || {
                sorter.order(path, children, &field, manual, flags)
            })?
        };
        Ok(directed(order, dir))
    }

    /// Order an arbitrary item list. Memoized by a digest of the list.
    pub fn sort_collection(
        &self,
        items: &[ChildEntry],
        by: &str,
        dir: &str,
        manual: &[String],
        flags: Option<SortFlags>,
    ) -> Result<Vec<ChildEntry>> {
        let field = OrderField::parse(by);
        let sorter = Sorter::new(&self.instances, self.collate());

        let order = if field == OrderField::Random {
            sorter.order("collection", items, &field, manual, flags)?
        } else {
            let key = collection_key(items, manual, by);
            self.sort.get_or_try_insert(&key, &field_key(by, flags), || {
                sorter.order("collection", items, &field, manual, flags)
            })?
        };
        Ok(directed(order, dir))
    }

    /// Children of `path` in the container's own order.
    pub(crate) fn sorted_children(&self, path: &str) -> Result<Vec<ChildEntry>> {
        match self.instances.get(path) {
            Some(doc) => self.sort(path, &doc.order_by, &doc.order_dir, None),
            None => Ok(Vec::new()),
        }
    }

    // ========================================================================
    // Tree Queries
    // ========================================================================

    /// Children of `path` as a collection.
    pub fn children(&self, path: &str) -> Result<Collection<'_>> {
        Ok(Collection::new(self, self.sorted_children(path)?))
    }

    /// Depth-first collection of the subtree at `current` (default: root),
    /// the root itself excluded.
    pub fn all(&self, current: Option<&str>) -> Result<Collection<'_>> {
        let start = current.unwrap_or(&self.root);
        let mut items = Vec::new();
        if let Some(doc) = self.instances.get(start) {
            self.collect_all(doc, &mut items)?;
        }
        Ok(Collection::new(self, items))
    }

    fn collect_all(&self, doc: &Document, items: &mut Vec<ChildEntry>) -> Result<()> {
        if !doc.root {
            items.push(ChildEntry {
                path: doc.path.clone(),
                slug: doc.slug.clone(),
            });
        }
        for child in self.sorted_children(&doc.path)? {
            if let Some(next) = self.instances.get(&child.path) {
                self.collect_all(next, items)?;
            }
        }
        Ok(())
    }

    /// Walk up from the page at `route` (itself included) to the page stored
    /// at `path`. The root is never returned.
    pub fn ancestor(&self, route: &str, path: &str) -> Option<&Document> {
        let mut current = self.find(route)?;
        while !current.root {
            if current.path == path {
                return Some(current);
            }
            current = self.parent_of(current)?;
        }
        None
    }

    /// Nearest ancestor of the page at `route` whose header sets `field`.
    pub fn inherited(&self, route: &str, field: &str) -> Option<&Document> {
        let mut current = self.parent_of(self.find(route)?)?;
        loop {
            if current.header.contains(field) {
                return Some(current);
            }
            if current.root {
                return None;
            }
            current = self.parent_of(current)?;
        }
    }

    /// `route → label` pairs of the tree, depth-first in page order.
    pub fn list(&self, options: &ListOptions) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        if let Some(root) = self.root() {
            self.list_level(root, 0, options, &mut out)?;
        }
        Ok(out)
    }

    fn list_level(
        &self,
        doc: &Document,
        level: usize,
        options: &ListOptions,
        out: &mut Vec<(String, String)>,
    ) -> Result<()> {
        if !doc.root {
            let route = if options.raw_routes {
                &doc.raw_route
            } else {
                &doc.route
            };
            let label = if options.show_fullpath {
                doc.route.clone()
            } else {
                let slug = if options.show_slug {
                    format!("({}) ", doc.slug)
                } else {
                    String::new()
                };
                format!("{}▸ {slug}{}", "  ".repeat(level.saturating_sub(1)), doc.title)
            };
            out.push((route.clone(), label));
        }

        if options.limit_levels.is_some_and(|limit| level >= limit) {
            return Ok(());
        }
        for child in self.sorted_children(&doc.path)? {
            let Some(next) = self.instances.get(&child.path) else {
                continue;
            };
            if options.show_all || next.routable || (next.modular && options.show_modular) {
                self.list_level(next, level + 1, options, out)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::page::delegated::{DelegatedSource, tests::sample_store};
    use crate::page::source::StorageSource;
    use filetime::{FileTime, set_file_mtime};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn touch(path: &Path, text: &str, mtime: i64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
        set_file_mtime(path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    /// Sample site shared by index and collection tests.
    pub(crate) fn write_site(dir: &Path) {
        touch(&dir.join("01.home/modular.md"), "---\ntitle: Home\naccess:\n  site.login: true\n---\n", 100);
        touch(&dir.join("01.home/_hero/hero.md"), "---\ntitle: Hero\n---\n", 110);
        touch(&dir.join("01.home/_features/features.md"), "---\ntitle: Features\n---\n", 120);
        touch(
            &dir.join("02.blog/blog.md"),
            "---\ntitle: Blog\norder_by: date\norder_dir: desc\nsidebar: true\n---\n",
            130,
        );
        touch(
            &dir.join("02.blog/post-a/item.md"),
            "---\ntitle: Post A\ndate: 2020-01-01\ntaxonomy:\n  tag: [rust]\n  category: news\n---\n",
            140,
        );
        touch(
            &dir.join("02.blog/post-b/item.md"),
            "---\ntitle: Post B\ndate: 2020-06-01\ntaxonomy:\n  tag: [rust, cms]\n---\n",
            150,
        );
        touch(
            &dir.join("03.about/default.md"),
            "---\ntitle: About\nroutes:\n  canonical: /company\n  aliases: [/who-we-are]\n\
             access:\n  admin:\n    super: true\n---\n",
            160,
        );
        touch(
            &dir.join("03.about/team/default.md"),
            "---\ntitle: Team\npublished: false\ntaxonomy:\n  tag: [cms]\n---\n",
            170,
        );
        touch(&dir.join("journal/default.md"), "---\nslug: news\n---\n", 180);
        touch(&dir.join("moved/default.md"), "---\nredirect: /blog\n---\n", 190);
        touch(&dir.join("docs/01.intro/default.md"), "---\ntitle: Intro\n---\n", 200);
        touch(&dir.join("docs/02.setup/default.md"), "---\ntitle: Setup\n---\n", 210);
        fs::create_dir_all(dir.join("drafts")).unwrap();
    }

    pub(crate) fn index_with(config: SiteConfig) -> (TempDir, PageIndex) {
        let dir = TempDir::new().unwrap();
        write_site(dir.path());
        let source = StorageSource::local(dir.path());
        let index = PageIndex::build(&source, Arc::new(config)).unwrap();
        (dir, index)
    }

    pub(crate) fn fixture() -> (TempDir, PageIndex) {
        index_with(SiteConfig::default())
    }

    fn slugs(items: &[ChildEntry]) -> Vec<&str> {
        items.iter().map(|c| c.slug.as_str()).collect()
    }

    fn path(index: &PageIndex, route: &str) -> String {
        index.find(route).unwrap().path.clone()
    }

    #[test]
    fn test_blog_children_date_desc() {
        let (_dir, index) = fixture();
        let blog = path(&index, "/blog");
        let children = index.children(&blog).unwrap();
        assert_eq!(slugs(children.items()), vec!["post-b", "post-a"]);

        assert_eq!(slugs(&index.sort(&blog, "date", "asc", None).unwrap()), vec!["post-a", "post-b"]);
        assert_eq!(slugs(&index.sort(&blog, "title", "desc", None).unwrap()), vec!["post-b", "post-a"]);
    }

    #[test]
    fn test_sort_memo_grows_lazily() {
        let (_dir, index) = fixture();
        let blog = path(&index, "/blog");
        let before = index.sort_table()[&blog].len();
        index.sort(&blog, "slug", "asc", None).unwrap();
        index.sort(&blog, "slug", "desc", None).unwrap();
        assert_eq!(index.sort_table()[&blog].len(), before + 1);

        // random never lands in the memo
        index.sort(&blog, "random", "asc", None).unwrap();
        assert_eq!(index.sort_table()[&blog].len(), before + 1);
        assert!(index.sort("/nowhere", "title", "asc", None).unwrap().is_empty());
    }

    #[test]
    fn test_sort_collection_memoized_by_items() {
        let (_dir, index) = fixture();
        let items = index.all(None).unwrap().items().to_vec();
        let first = index.sort_collection(&items, "title", "asc", &[], None).unwrap();
        let again = index.sort_collection(&items, "title", "asc", &[], None).unwrap();
        assert_eq!(first, again);
        assert_eq!(first[0].slug, "about");

        let manual = vec!["team".to_string()];
        let manual_first = index.sort_collection(&items, "title", "asc", &manual, None).unwrap();
        assert_eq!(manual_first[0].slug, "team");
    }

    #[test]
    fn test_drafts_hidden_when_configured() {
        let mut config = SiteConfig::default();
        config.pages.hide_empty_folders = true;
        let (_dir, index) = index_with(config);
        let drafts = index.find("/drafts").unwrap();
        assert!(!drafts.routable);
        assert!(!drafts.visible);
    }

    #[test]
    fn test_paths_unique() {
        let (_dir, index) = fixture();
        let mut seen = BTreeSet::new();
        for doc in index.instances().values() {
            assert!(seen.insert(doc.path.as_str()), "duplicate {}", doc.path);
        }
        // every child entry points at an indexed page, exactly once
        let listed: Vec<_> = index.children_map().values().flatten().map(|c| &c.path).collect();
        let unique: BTreeSet<_> = listed.iter().collect();
        assert_eq!(listed.len(), unique.len());
        assert_eq!(listed.len(), index.instances().len() - 1);
    }

    #[test]
    fn test_root_and_get() {
        let (_dir, index) = fixture();
        let root = index.root().unwrap();
        assert!(root.root);
        assert_eq!(index.get(&root.path), Some(root));
        assert!(index.last_modified() >= 210);
        assert_eq!(index.format_version(), crate::page::source::PAGE_FORMAT);
        assert!(!index.is_delegated());
    }

    #[test]
    fn test_all_depth_first() {
        let (_dir, index) = fixture();
        let all = index.all(None).unwrap();
        let order = slugs(all.items());
        assert_eq!(
            order,
            vec![
                "home", "_features", "_hero", "blog", "post-b", "post-a", "about", "team", "docs",
                "intro", "setup", "drafts", "news", "moved"
            ]
        );

        let blog = path(&index, "/blog");
        let sub = index.all(Some(&blog)).unwrap();
        assert_eq!(slugs(sub.items()), vec!["blog", "post-b", "post-a"]);
    }

    #[test]
    fn test_ancestor_and_inherited() {
        let (_dir, index) = fixture();
        let blog = path(&index, "/blog");
        assert_eq!(index.ancestor("/blog/post-a", &blog).unwrap().path, blog);
        assert_eq!(index.ancestor("/blog", &blog).unwrap().path, blog);
        assert!(index.ancestor("/about", &blog).is_none());

        assert_eq!(index.inherited("/blog/post-a", "sidebar").unwrap().path, blog);
        assert!(index.inherited("/blog", "sidebar").is_none());
        assert!(index.inherited("/missing", "sidebar").is_none());
    }

    #[test]
    fn test_list() {
        let (_dir, index) = fixture();
        let list = index.list(&ListOptions::default()).unwrap();
        assert_eq!(list[0], ("/".to_string(), "▸ Home".to_string()));
        assert!(list.contains(&("/blog/post-b".to_string(), "  ▸ Post B".to_string())));
        assert!(list.iter().any(|(route, _)| route == "/drafts"));

        let routable = ListOptions {
            show_all: false,
            ..Default::default()
        };
        let list = index.list(&routable).unwrap();
        assert!(!list.iter().any(|(route, _)| route == "/drafts"));
        assert!(!list.iter().any(|(route, _)| route.ends_with("_hero")));

        let shallow = ListOptions {
            raw_routes: true,
            show_fullpath: true,
            limit_levels: Some(1),
            ..Default::default()
        };
        let list = index.list(&shallow).unwrap();
        assert!(list.contains(&("/journal".to_string(), "/news".to_string())));
        assert!(!list.iter().any(|(route, _)| route == "/blog/post-a"));
    }

    #[test]
    fn test_registries() {
        let (_dir, index) = fixture();
        assert_eq!(index.home_route(), "/home");
        assert_eq!(index.access_levels(), vec!["site.login", "super"]);

        let types = index.page_types();
        assert!(types.standard.contains("blog"));
        assert!(types.standard.contains("item"));
        assert!(types.modular.contains("hero"));
        assert!(!types.standard.contains("hero"));
        assert!(std::ptr::eq(types, index.page_types()));
    }

    #[test]
    fn test_home_route_per_locale() {
        let mut config = SiteConfig::default();
        config.language.enabled = true;
        config.language.active = "fr".into();
        config.language.default = "en".into();
        config.home.aliases.insert("en".into(), "/blog".into());
        let (_dir, index) = index_with(config);
        assert_eq!(index.home_route(), "/blog");
        assert_eq!(index.find("/").unwrap().slug, "blog");
    }

    #[test]
    fn test_taxonomy_excludes_unpublished() {
        let (_dir, index) = fixture();
        let cms = index.taxonomy().pages("tag", "cms").unwrap();
        assert_eq!(cms.len(), 1);
        assert!(cms.iter().all(|p| p.ends_with("post-b")));
    }

    #[test]
    fn test_delegated_index() {
        let store = sample_store();
        let source = DelegatedSource::new(&store, "/store", "en", ".md");
        let index = PageIndex::build(&source, Arc::new(SiteConfig::default())).unwrap();

        assert!(index.is_delegated());
        assert_eq!(index.format_version(), crate::page::delegated::DELEGATED_FORMAT);
        let post = index.find("/blog/post-a").unwrap();
        assert_eq!(post.template, "item");
        assert_eq!(post.title, "A");
        // `about` has no `en` translation, so neither it nor `team` exist
        assert!(index.find("/about").is_none());
        assert!(index.find("/about/team").is_none());
    }
}
