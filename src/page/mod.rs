//! The `Document` entity and its producers.
//!
//! A document is one node of the page tree, keyed by its storage path. It
//! may or may not have content: a folder without a content file is still a
//! document (non-routable) so its children keep a parent.

pub mod delegated;
pub mod header;
pub mod render;
pub mod source;

pub use header::Header;

use crate::config::SiteConfig;
use crate::utils::{date, hash::Digest, hash::hash_str, slug};
use serde::{Deserialize, Serialize};
use source::ContentFile;
use std::collections::BTreeMap;

/// One page of the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Storage path, unique across the index.
    pub path: String,
    pub parent: Option<String>,
    /// Last path segment as found in storage (`01.blog`).
    pub folder: String,
    pub slug: String,
    pub title: String,
    pub template: String,
    /// Selected content file, if any.
    pub file: Option<String>,
    pub extension: String,

    pub order_by: String,
    pub order_dir: String,
    pub order_manual: Vec<String>,

    /// Newest mtime of the folder's files (and children for modular pages).
    pub modified: i64,
    /// `modified` followed by a digest of the content path.
    pub id: String,
    pub date: Option<i64>,
    pub publish_date: Option<i64>,
    pub unpublish_date: Option<i64>,

    pub routable: bool,
    pub visible: bool,
    pub published: bool,
    pub modular: bool,
    pub root: bool,

    pub route: String,
    pub raw_route: String,
    pub canonical_route: Option<String>,
    pub route_aliases: Vec<String>,
    pub redirect: Option<String>,

    pub taxonomy: BTreeMap<String, Vec<String>>,
    pub header: Header,
}

impl Document {
    /// The tree root: never routable, never has content.
    pub fn new_root(path: &str, config: &SiteConfig) -> Self {
        let mut doc = Self::blank(path, None, "", config);
        doc.root = true;
        doc.routable = false;
        doc.template = "default".into();
        doc
    }

    /// A folder document before its content (if any) is applied.
    ///
    /// Order settings are inherited from `parent`.
    pub fn new(path: &str, folder: &str, parent: &Document, config: &SiteConfig) -> Self {
        let mut doc = Self::blank(path, Some(parent.path.clone()), folder, config);
        doc.order_by = parent.order_by.clone();
        doc.order_dir = parent.order_dir.clone();
        doc.modular = folder.starts_with(&config.pages.hide_marker);
        doc.visible = slug::has_order_prefix(folder);
        doc
    }

    fn blank(path: &str, parent: Option<String>, folder: &str, config: &SiteConfig) -> Self {
        let slug = slug::folder_slug(folder);
        Self {
            path: path.to_owned(),
            parent,
            folder: folder.to_owned(),
            title: slug::title_from_slug(&slug),
            slug,
            template: String::new(),
            file: None,
            extension: String::new(),
            order_by: config.pages.order.by.clone(),
            order_dir: config.pages.order.dir.clone(),
            order_manual: Vec::new(),
            modified: 0,
            id: String::new(),
            date: None,
            publish_date: None,
            unpublish_date: None,
            routable: true,
            visible: false,
            published: true,
            modular: false,
            root: false,
            route: String::new(),
            raw_route: String::new(),
            canonical_route: None,
            route_aliases: Vec::new(),
            redirect: None,
            taxonomy: BTreeMap::new(),
            header: Header::default(),
        }
    }

    /// Apply the selected content file: template, header fields, publishing
    /// window (evaluated against `now`).
    pub fn apply_content(&mut self, content: ContentFile, config: &SiteConfig, now: i64) {
        let header = content.header;
        let fmt = Some(config.pages.date_format.as_str());

        self.file = Some(content.path);
        self.extension = content.extension;
        self.template = header.get_str("template").unwrap_or(content.template);

        if let Some(custom) = header.get_str("slug").map(|s| slug::sanitize_slug(&s))
            && !custom.is_empty()
        {
            self.slug = custom;
        }
        self.title = header
            .get_str("title")
            .unwrap_or_else(|| slug::title_from_slug(&self.slug));

        if let Some(by) = header.get_str("order_by") {
            self.order_by = by;
        }
        if let Some(dir) = header.get_str("order_dir") {
            self.order_dir = dir.to_ascii_lowercase();
        }
        self.order_manual = header.get_list("order_manual");

        let timestamp = |key: &str| header.get(key).and_then(|v| date::value_to_timestamp(v, fmt));
        self.date = timestamp("date");
        self.publish_date = timestamp("publish_date");
        self.unpublish_date = timestamp("unpublish_date");

        if let Some(visible) = header.get_bool("visible") {
            self.visible = visible;
        }
        if let Some(routable) = header.get_bool("routable") {
            self.routable = routable;
        }
        self.published = header.get_bool("published").unwrap_or(true);
        if self.publish_date.is_some_and(|t| t > now) {
            self.published = false;
        }
        if self.unpublish_date.is_some_and(|t| t < now) {
            self.published = false;
        }

        if let Some(serde_json::Value::Object(terms)) = header.get("taxonomy") {
            self.taxonomy = terms
                .keys()
                .map(|name| (name.clone(), header.get_list(&format!("taxonomy.{name}"))))
                .filter(|(_, values)| !values.is_empty())
                .collect();
        }

        self.redirect = header.get_str("redirect").filter(|r| !r.is_empty());
        self.canonical_route = header.get_str("routes.canonical").filter(|r| !r.is_empty());
        self.route_aliases = header.get_list("routes.aliases");

        self.header = header;
    }

    /// Compute default and raw routes below the parent's.
    ///
    /// `routes.default` in the header replaces the default route.
    pub fn assign_routes(&mut self, parent_route: &str, parent_raw_route: &str) {
        let base = parent_route.trim_end_matches('/');
        let raw_base = parent_raw_route.trim_end_matches('/');
        self.route = format!("{base}/{}", self.slug);
        self.raw_route = format!("{raw_base}/{}", slug::folder_slug(&self.folder));

        if let Some(custom) = self.header.get_str("routes.default").filter(|r| !r.is_empty()) {
            self.route = custom;
        }
    }

    /// Record the final modification time and derive the content id.
    pub fn set_modified(&mut self, modified: i64) {
        self.modified = modified;
        let source = self.file.as_deref().unwrap_or(&self.path);
        self.id = format!("{modified}{}", &hash_str(source)[..16]);
    }

    /// Primary date: the header date, else the modification time.
    pub fn date(&self) -> i64 {
        self.date.unwrap_or(self.modified)
    }

    /// Stable key for render caches.
    pub fn cache_key(&self) -> String {
        Digest::new().part("document").part(&self.path).hex()
    }

    /// Declared access levels (`access` header) as a flat list of names.
    ///
    /// Mapping entries with scalar values contribute their key, nested
    /// mappings contribute their inner keys, sequences their items.
    pub fn access_levels(&self) -> Vec<String> {
        use serde_json::Value;

        let Some(access) = self.header.get("access") else {
            return Vec::new();
        };
        match access {
            Value::Object(map) => map
                .iter()
                .flat_map(|(key, value)| match value {
                    Value::Object(inner) => inner.keys().cloned().collect::<Vec<_>>(),
                    _ => vec![key.clone()],
                })
                .collect(),
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Whether any declared access entry matches one of `levels`.
    ///
    /// Nested declarations match on either their inner keys or values.
    pub fn has_access_level(&self, levels: &[String]) -> bool {
        use serde_json::Value;

        let hit = |s: &str| levels.iter().any(|l| l == s);
        match self.header.get("access") {
            Some(Value::Object(map)) => map.iter().any(|(key, value)| match value {
                Value::Object(inner) => inner.iter().any(|(k, v)| {
                    hit(k.as_str()) || v.as_str().is_some_and(hit)
                }),
                _ => hit(key.as_str()),
            }),
            Some(Value::Array(items)) => items.iter().any(|v| v.as_str().is_some_and(hit)),
            Some(Value::String(s)) => hit(s.as_str()),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_600_000_000;

    fn content(yaml: &str) -> ContentFile {
        ContentFile {
            path: "/p/01.blog/blog.md".into(),
            header: Header::from_yaml(yaml).unwrap(),
            template: "blog".into(),
            extension: ".md".into(),
            modified: 10,
        }
    }

    fn blog(config: &SiteConfig) -> Document {
        let root = Document::new_root("/p", config);
        Document::new("/p/01.blog", "01.blog", &root, config)
    }

    #[test]
    fn test_new_folder_defaults() {
        let config = SiteConfig::default();
        let doc = blog(&config);
        assert_eq!(doc.slug, "blog");
        assert_eq!(doc.title, "Blog");
        assert_eq!(doc.parent.as_deref(), Some("/p"));
        assert!(doc.visible, "numeric prefix makes pages visible");
        assert!(!doc.modular);
        assert_eq!(doc.order_by, "default");

        let root = Document::new_root("/p", &config);
        let hero = Document::new("/p/_hero", "_hero", &root, &config);
        assert!(hero.modular);
        assert!(!hero.visible);
    }

    #[test]
    fn test_apply_content_header_fields() {
        let config = SiteConfig::default();
        let mut doc = blog(&config);
        doc.apply_content(
            content(
                "title: My Blog\nslug: news\norder_by: date\norder_dir: DESC\n\
                 order_manual: [b, a]\ndate: 2020-01-01\nvisible: false\n\
                 taxonomy:\n  tag: [rust, cms]\n  category: blog\n  empty: []\n\
                 routes:\n  canonical: /canon\n  aliases: [/n1, /n2]\nredirect: /elsewhere\n",
            ),
            &config,
            NOW,
        );

        assert_eq!(doc.title, "My Blog");
        assert_eq!(doc.slug, "news");
        assert_eq!(doc.template, "blog");
        assert_eq!(doc.order_by, "date");
        assert_eq!(doc.order_dir, "desc");
        assert_eq!(doc.order_manual, vec!["b", "a"]);
        assert_eq!(doc.date, Some(1_577_836_800));
        assert!(!doc.visible);
        assert_eq!(doc.taxonomy["tag"], vec!["rust", "cms"]);
        assert_eq!(doc.taxonomy["category"], vec!["blog"]);
        assert!(!doc.taxonomy.contains_key("empty"));
        assert_eq!(doc.canonical_route.as_deref(), Some("/canon"));
        assert_eq!(doc.route_aliases, vec!["/n1", "/n2"]);
        assert_eq!(doc.redirect.as_deref(), Some("/elsewhere"));
        assert_eq!(doc.file.as_deref(), Some("/p/01.blog/blog.md"));
    }

    #[test]
    fn test_publish_window() {
        let config = SiteConfig::default();

        let mut doc = blog(&config);
        doc.apply_content(content("published: false"), &config, NOW);
        assert!(!doc.published);

        let mut doc = blog(&config);
        doc.apply_content(content("publish_date: 2099-01-01"), &config, NOW);
        assert!(!doc.published);

        let mut doc = blog(&config);
        doc.apply_content(content("unpublish_date: 2000-01-01"), &config, NOW);
        assert!(!doc.published);

        let mut doc = blog(&config);
        doc.apply_content(
            content("publish_date: 2000-01-01\nunpublish_date: 2099-01-01"),
            &config,
            NOW,
        );
        assert!(doc.published);
    }

    #[test]
    fn test_assign_routes() {
        let config = SiteConfig::default();
        let mut doc = blog(&config);
        doc.apply_content(content("slug: news"), &config, NOW);
        doc.assign_routes("", "");
        assert_eq!(doc.route, "/news");
        assert_eq!(doc.raw_route, "/blog");

        let mut child = Document::new("/p/01.blog/post", "post", &doc, &config);
        child.assign_routes(&doc.route, &doc.raw_route);
        assert_eq!(child.route, "/news/post");
        assert_eq!(child.raw_route, "/blog/post");

        let mut custom = blog(&config);
        custom.apply_content(content("routes:\n  default: /custom"), &config, NOW);
        custom.assign_routes("", "");
        assert_eq!(custom.route, "/custom");
        assert_eq!(custom.raw_route, "/blog");
    }

    #[test]
    fn test_modified_and_id() {
        let config = SiteConfig::default();
        let mut doc = blog(&config);
        doc.set_modified(1234);
        assert!(doc.id.starts_with("1234"));
        assert_eq!(doc.id.len(), 4 + 16);
        assert_eq!(doc.date(), 1234);

        let before = doc.id.clone();
        doc.set_modified(1235);
        assert_ne!(before, doc.id);
    }

    #[test]
    fn test_access_levels() {
        let config = SiteConfig::default();
        let mut doc = blog(&config);
        doc.apply_content(
            content("access:\n  site.login: true\n  admin:\n    super: true\n    pages: editor\n"),
            &config,
            NOW,
        );
        // header maps are key-sorted: `admin` (inner keys) before `site.login`
        assert_eq!(doc.access_levels(), vec!["pages", "super", "site.login"]);
        assert!(doc.has_access_level(&["site.login".into()]));
        assert!(doc.has_access_level(&["editor".into()]));
        assert!(doc.has_access_level(&["super".into()]));
        assert!(!doc.has_access_level(&["guest".into()]));

        let mut doc = blog(&config);
        doc.apply_content(content("access: members"), &config, NOW);
        assert_eq!(doc.access_levels(), vec!["members"]);
        assert!(doc.has_access_level(&["members".into()]));
    }
}
