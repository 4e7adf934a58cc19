//! Collection filters. Each keeps the matching pages in order.

use super::Collection;
use super::params::Filters;
use crate::page::Document;
use crate::utils::date;
use std::collections::BTreeMap;

impl<'i> Collection<'i> {
    /// Keep pages for which `keep` holds.
    pub fn filter(&self, keep: impl Fn(&Document) -> bool) -> Self {
        let items = self
            .items
            .iter()
            .filter(|e| self.index.get(&e.path).is_some_and(&keep))
            .cloned()
            .collect();
        self.with_items(items)
    }

    pub fn published(&self) -> Self {
        self.filter(|doc| doc.published)
    }

    pub fn non_published(&self) -> Self {
        self.filter(|doc| !doc.published)
    }

    pub fn visible(&self) -> Self {
        self.filter(|doc| doc.visible)
    }

    pub fn non_visible(&self) -> Self {
        self.filter(|doc| !doc.visible)
    }

    pub fn modular(&self) -> Self {
        self.filter(|doc| doc.modular)
    }

    pub fn non_modular(&self) -> Self {
        self.filter(|doc| !doc.modular)
    }

    pub fn routable(&self) -> Self {
        self.filter(|doc| doc.routable)
    }

    pub fn non_routable(&self) -> Self {
        self.filter(|doc| !doc.routable)
    }

    /// Pages using template `template`.
    pub fn of_type(&self, template: &str) -> Self {
        self.filter(|doc| doc.template == template)
    }

    pub fn of_one_of_these_types(&self, templates: &[String]) -> Self {
        self.filter(|doc| templates.contains(&doc.template))
    }

    pub fn of_one_of_these_access_levels(&self, levels: &[String]) -> Self {
        self.filter(|doc| doc.has_access_level(levels))
    }

    /// Pages dated within `start..=end`.
    ///
    /// `field` selects the date: a built-in date field or a header value.
    /// Pages without that value count as dated 0.
    pub fn date_range(&self, start: i64, end: Option<i64>, field: Option<&str>) -> Self {
        let fmt = Some(self.index.config().pages.date_format.as_str());
        self.filter(|doc| {
            let date = match field {
                None | Some("date") => doc.date(),
                Some("modified") => doc.modified,
                Some("publish_date") => doc.publish_date.unwrap_or(0),
                Some("unpublish_date") => doc.unpublish_date.unwrap_or(0),
                Some(field) => {
                    let key = field.strip_prefix("header.").unwrap_or(field);
                    doc.header
                        .get(key)
                        .and_then(|v| date::value_to_timestamp(v, fmt))
                        .unwrap_or(0)
                }
            };
            date >= start && end.is_none_or(|end| date <= end)
        })
    }

    /// Pages carrying every requested term. Modular pages always stay.
    pub fn filter_taxonomies(&self, query: &BTreeMap<String, Vec<String>>) -> Self {
        self.filter(|doc| {
            doc.modular
                || query.iter().all(|(name, terms)| {
                    let have = doc.taxonomy.get(name);
                    terms
                        .iter()
                        .all(|term| have.is_some_and(|have| have.contains(term)))
                })
        })
    }

    /// Apply a filter set. A pair requested `true` on both sides is dropped.
    pub fn apply_filters(&self, filters: &Filters) -> Self {
        let published = match (filters.published, filters.non_published) {
            (None, None) => Some(true),
            (on, off) => pair(on, off),
        };

        let mut out = self.clone();
        for (state, keep, exclude) in [
            (published, Self::published as fn(&Self) -> Self, Self::non_published as fn(&Self) -> Self),
            (pair(filters.visible, filters.non_visible), Self::visible, Self::non_visible),
            (pair(filters.modular, filters.non_modular), Self::modular, Self::non_modular),
            (pair(filters.routable, filters.non_routable), Self::routable, Self::non_routable),
        ] {
            out = match state {
                Some(true) => keep(&out),
                Some(false) => exclude(&out),
                None => out,
            };
        }

        if let Some(template) = &filters.page_type {
            out = out.of_type(template);
        }
        if !filters.types.is_empty() {
            out = out.of_one_of_these_types(&filters.types);
        }
        if !filters.access.is_empty() {
            out = out.of_one_of_these_access_levels(&filters.access);
        }
        out
    }
}

/// `Some(true)` keeps X, `Some(false)` keeps non-X, `None` filters nothing.
fn pair(on: Option<bool>, off: Option<bool>) -> Option<bool> {
    match (on == Some(true), off == Some(true)) {
        (true, false) => Some(true),
        (false, true) => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::fixture;

    fn slugs(c: &Collection<'_>) -> Vec<String> {
        c.items().iter().map(|e| e.slug.clone()).collect()
    }

    #[test]
    fn test_pair() {
        assert_eq!(pair(Some(true), None), Some(true));
        assert_eq!(pair(Some(false), Some(true)), Some(false));
        assert_eq!(pair(Some(true), Some(true)), None);
        assert_eq!(pair(Some(false), Some(false)), None);
        assert_eq!(pair(None, None), None);
    }

    #[test]
    fn test_filter_monotonicity() {
        let (_dir, index) = fixture();
        let all = index.all(None).unwrap();
        let published = all.published();
        let visible = all.visible();
        let both = published.visible();

        assert!(both.len() <= published.len());
        assert!(both.len() <= visible.len());
        assert!(published.len() < all.len(), "`team` is unpublished");
        assert_eq!(both.len(), all.visible().published().len());
    }

    #[test]
    fn test_boolean_filters() {
        let (_dir, index) = fixture();
        let all = index.all(None).unwrap();
        assert_eq!(slugs(&all.non_published()), vec!["team"]);
        assert_eq!(slugs(&all.modular()), vec!["_features", "_hero"]);
        assert_eq!(all.non_modular().len(), all.len() - 2);
        assert!(slugs(&all.non_routable()).contains(&"docs".to_string()));
        assert!(!slugs(&all.routable()).contains(&"docs".to_string()));
        assert_eq!(slugs(&all.visible()), vec!["home", "blog", "about", "intro", "setup"]);
        assert!(all.non_visible().contains(&index.find("/moved").unwrap().path));
    }

    #[test]
    fn test_type_and_access() {
        let (_dir, index) = fixture();
        let all = index.all(None).unwrap();
        assert_eq!(slugs(&all.of_type("item")), vec!["post-b", "post-a"]);
        assert_eq!(
            slugs(&all.of_one_of_these_types(&["blog".into(), "modular".into()])),
            vec!["home", "blog"]
        );
        assert_eq!(slugs(&all.of_one_of_these_access_levels(&["site.login".into()])), vec!["home"]);
        assert_eq!(slugs(&all.of_one_of_these_access_levels(&["super".into()])), vec!["about"]);
        assert!(all.of_one_of_these_access_levels(&["admin".into()]).is_empty());
    }

    #[test]
    fn test_apply_filters() {
        let (_dir, index) = fixture();
        let all = index.all(None).unwrap();

        // published by default
        let c = all.apply_filters(&Filters::default());
        assert_eq!(c.len(), all.published().len());

        let both = Filters {
            published: Some(true),
            non_published: Some(true),
            ..Default::default()
        };
        assert_eq!(all.apply_filters(&both).len(), all.len());

        let f = Filters {
            non_modular: Some(true),
            visible: Some(true),
            types: vec!["item".into(), "default".into()],
            ..Default::default()
        };
        assert_eq!(slugs(&all.apply_filters(&f)), vec!["about", "intro", "setup"]);
    }

    #[test]
    fn test_taxonomies_and_dates() {
        let (_dir, index) = fixture();
        let blog = index.children(&index.find("/blog").unwrap().path).unwrap();
        let query = BTreeMap::from([("tag".to_string(), vec!["rust".to_string(), "cms".to_string()])]);
        assert_eq!(slugs(&blog.filter_taxonomies(&query)), vec!["post-b"]);

        // modular pages are exempt
        let home = index.children(&index.find("/").unwrap().path).unwrap();
        assert_eq!(home.filter_taxonomies(&query).len(), 2);

        let june = 1_590_969_600; // 2020-06-01T00:00:00Z
        assert_eq!(slugs(&blog.date_range(june, None, None)), vec!["post-b"]);
        assert_eq!(slugs(&blog.date_range(0, Some(june - 1), Some("header.date"))), vec!["post-a"]);
        assert_eq!(blog.date_range(1, None, Some("header.missing")).len(), 0);
        assert_eq!(blog.date_range(100, Some(200), Some("modified")).len(), 2);
    }
}
