//! Collection parameters, as written in a page header or a YAML file:
//!
//! ```yaml
//! items: '@self.children'
//! filter:
//!   published: true
//!   non-modular: true
//! taxonomies:
//!   tag: [rust]
//! dateRange:
//!   start: 2020-01-01
//!   field: header.date
//! order:
//!   by: date
//!   dir: desc
//!   sort_flags: [SORT_NATURAL, SORT_FLAG_CASE]
//! limit: 10
//! pagination: true
//! ```

use super::query::ItemSource;
use crate::config::defaults;
use crate::index::SortFlags;
use anyhow::{Context, Result};
use educe::Educe;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CollectionParams {
    /// Seed item specifier. Absent means an empty collection.
    pub items: Option<ItemSource>,

    pub filter: Filters,

    /// Required taxonomy terms, AND across all pairs.
    pub taxonomies: BTreeMap<String, Vec<String>>,

    #[serde(rename = "dateRange", alias = "date_range")]
    pub date_range: Option<DateRange>,

    /// Absent keeps the seed order.
    pub order: Option<OrderSpec>,

    /// Page size. Falls back to `[pagination] limit`.
    pub limit: Option<usize>,

    /// Offset by the current page. Falls back to the query context.
    pub pagination: Option<bool>,

    /// Merge taxonomy terms from URL parameters. Falls back to
    /// `[site] url_taxonomy_filters`.
    pub url_taxonomy_filters: Option<bool>,
}

impl CollectionParams {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("invalid collection parameters")
    }
}

/// Boolean and membership filters.
///
/// `published` defaults to `true` when neither `published` nor
/// `non-published` is given. Setting both sides of a pair to `true`
/// applies neither.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Filters {
    pub published: Option<bool>,
    pub non_published: Option<bool>,
    pub visible: Option<bool>,
    pub non_visible: Option<bool>,
    pub modular: Option<bool>,
    pub non_modular: Option<bool>,
    pub routable: Option<bool>,
    pub non_routable: Option<bool>,
    #[serde(rename = "type")]
    pub page_type: Option<String>,
    pub types: Vec<String>,
    pub access: Vec<String>,
}

/// Inclusive date window. Bounds are free-form date text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DateRange {
    pub start: Option<serde_json::Value>,
    pub end: Option<serde_json::Value>,
    /// `date`, `modified`, `publish_date`, `unpublish_date` or a header
    /// field (`header.published_at`). Defaults to the primary date.
    pub field: Option<String>,
}

#[derive(Debug, Clone, Educe, Deserialize)]
#[educe(Default)]
#[serde(default, deny_unknown_fields)]
pub struct OrderSpec {
    #[educe(Default = defaults::pages::order::by())]
    pub by: String,

    #[educe(Default = defaults::pages::order::dir())]
    pub dir: String,

    /// Manual slug order placed first.
    pub custom: Vec<String>,

    pub sort_flags: Option<FlagSpec>,
}

/// `sort_flags` given as names or as a raw bit value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FlagSpec {
    Bits(u32),
    Name(String),
    Names(Vec<String>),
}

impl FlagSpec {
    pub fn resolve(&self) -> SortFlags {
        match self {
            Self::Bits(bits) => SortFlags::from_bits_truncate(*bits),
            Self::Name(name) => SortFlags::from_names([name]),
            Self::Names(names) => SortFlags::from_names(names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::query::{Relation, Scope};

    #[test]
    fn test_from_yaml() {
        let params = CollectionParams::from_yaml(
            "items: '@self.children'\n\
             filter:\n  non-modular: true\n  type: item\n\
             dateRange:\n  start: 2020-01-01\n\
             order:\n  by: date\n  dir: desc\n  sort_flags: [SORT_NATURAL]\n\
             limit: 5\n",
        )
        .unwrap();

        assert_eq!(
            params.items,
            Some(ItemSource::Pages {
                scope: Scope::Current,
                relation: Relation::Children,
            })
        );
        assert_eq!(params.filter.non_modular, Some(true));
        assert_eq!(params.filter.page_type.as_deref(), Some("item"));
        assert!(params.filter.published.is_none());
        assert!(params.date_range.unwrap().start.is_some());
        let order = params.order.unwrap();
        assert_eq!(order.by, "date");
        assert_eq!(order.sort_flags.unwrap().resolve(), SortFlags::NATURAL);
        assert_eq!(params.limit, Some(5));
    }

    #[test]
    fn test_defaults() {
        let params = CollectionParams::from_yaml("{}").unwrap();
        assert!(params.items.is_none());
        assert!(params.order.is_none());
        assert!(params.taxonomies.is_empty());

        let order = CollectionParams::from_yaml("order: {by: title}").unwrap().order.unwrap();
        assert_eq!(order.by, "title");
        assert_eq!(order.dir, "asc");
    }

    #[test]
    fn test_flag_spec() {
        assert_eq!(FlagSpec::Bits(14).resolve(), SortFlags::NATURAL | SortFlags::FLAG_CASE);
        assert_eq!(FlagSpec::Name("string".into()).resolve(), SortFlags::STRING);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(CollectionParams::from_yaml("lmit: 5").is_err());
    }
}
