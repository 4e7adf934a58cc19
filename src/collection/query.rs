//! Item source specifiers and the collection pipeline.
//!
//! A specifier names the seed pages of a collection:
//!
//! | Specifier                     | Items                                   |
//! |-------------------------------|-----------------------------------------|
//! | `@self`, `@self.children`     | non-modular children of the current page |
//! | `@self.all`                   | every child, modular included           |
//! | `@self.modular`               | modular children                        |
//! | `@page.descendants: /blog`    | subtree of `/blog` without itself        |
//! | `@root.siblings`              | never anything                          |
//! | `@taxonomy.tag: [rust, cms]`  | pages tagged with every term             |
//! | `@taxonomy: {tag: rust}`      | same, map form                          |
//! | `[source, source]`            | union, first occurrence keeps its place |
//!
//! Specifiers are parsed once; an unknown one evaluates to nothing.
//!
//! The pipeline then runs: taxonomy filter → boolean filters → date range →
//! order (only when requested) → pagination.

use super::Collection;
use super::params::CollectionParams;
use crate::index::{ChildEntry, Operator, PageIndex};
use crate::log;
use crate::page::Document;
use crate::utils::date;
use educe::Educe;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Which page a specifier starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The page the query runs for.
    Current,
    /// The page at a route.
    Page(String),
    Root,
}

/// Which pages relative to the scope page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Every child.
    All,
    Modular,
    /// Non-modular children.
    Children,
    /// The scope page itself.
    Page,
    Parent,
    Siblings,
    Descendants,
}

impl Relation {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "all" => Self::All,
            "modular" => Self::Modular,
            "children" => Self::Children,
            "page" | "self" => Self::Page,
            "parent" => Self::Parent,
            "siblings" => Self::Siblings,
            "descendants" => Self::Descendants,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemSource {
    Pages { scope: Scope, relation: Relation },
    Taxonomy {
        query: BTreeMap<String, Vec<String>>,
        operator: Operator,
    },
    Union(Vec<ItemSource>),
    Unknown(String),
}

impl<'de> Deserialize<'de> for ItemSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(|value| Self::parse(&value))
    }
}

impl ItemSource {
    pub fn parse(value: &Value) -> Self {
        match value {
            Value::String(command) => Self::command(command, &Value::Null),
            Value::Object(map) if map.len() == 1 => {
                let (command, params) = map.iter().next().map_or(("", &Value::Null), |(k, v)| (k.as_str(), v));
                Self::command(command, params)
            }
            Value::Object(map) => Self::Union(
                map.iter()
                    .map(|(command, params)| Self::command(command, params))
                    .collect(),
            ),
            Value::Array(parts) => Self::Union(parts.iter().map(Self::parse).collect()),
            other => Self::Unknown(other.to_string()),
        }
    }

    fn command(command: &str, params: &Value) -> Self {
        let mut parts = command.split('.');
        let scope = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();

        let scope = match scope {
            "@self" | "self@" => Scope::Current,
            "@root" | "root@" => Scope::Root,
            "@page" | "page@" => match first_string(params) {
                Some(route) => Scope::Page(route),
                None => return Self::Unknown(command.to_owned()),
            },
            "@taxonomy" | "taxonomy@" => return Self::taxonomy(&rest.join("."), params),
            _ => return Self::Unknown(command.to_owned()),
        };

        let relation = match rest.first() {
            // a bare scope and `@self.modular: false` both list the plain children
            None => Relation::Children,
            Some(&"modular") if params == &Value::Bool(false) => Relation::Children,
            Some(name) => match Relation::parse(name) {
                Some(relation) => relation,
                None => return Self::Unknown(command.to_owned()),
            },
        };
        Self::Pages { scope, relation }
    }

    fn taxonomy(name: &str, params: &Value) -> Self {
        let mut query = BTreeMap::new();
        let mut operator = Operator::And;

        if name.is_empty() {
            let Value::Object(map) = params else {
                return Self::Unknown("@taxonomy".into());
            };
            for (key, terms) in map {
                if key == "operator" {
                    operator = terms.as_str().map(Operator::parse).unwrap_or_default();
                } else {
                    query.insert(key.clone(), strings(terms));
                }
            }
        } else {
            query.insert(name.to_owned(), strings(params));
        }
        Self::Taxonomy { query, operator }
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().flat_map(strings).collect(),
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        _ => Vec::new(),
    }
}

fn first_string(value: &Value) -> Option<String> {
    strings(value).into_iter().next()
}

/// Request state a query runs in.
#[derive(Debug, Clone, Educe)]
#[educe(Default)]
pub struct QueryContext {
    /// Route of the current page (`@self`).
    pub current: Option<String>,
    /// URL parameters such as `tag=rust,cms`.
    pub url_params: BTreeMap<String, String>,
    /// Current page number, 1-based.
    #[educe(Default = 1)]
    pub page: usize,
    /// Whether pagination applies when the parameters do not say.
    #[educe(Default = true)]
    pub pagination: bool,
}

// ============================================================================
// Evaluation
// ============================================================================

impl PageIndex {
    /// Build a collection from parameters.
    ///
    /// Stage failures are logged and leave the items as they were.
    pub fn collection(&self, params: &CollectionParams, ctx: &QueryContext) -> Collection<'_> {
        let Some(source) = &params.items else {
            return Collection::new(self, Vec::new()).with_params(params.clone());
        };

        let mut params = params.clone();
        let url_filters = params
            .url_taxonomy_filters
            .unwrap_or(self.config().site.url_taxonomy_filters);
        if url_filters {
            for name in &self.config().site.taxonomies {
                if let Some(terms) = ctx.url_params.get(name) {
                    params.taxonomies.entry(name.clone()).or_default().extend(
                        terms
                            .split(',')
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .map(str::to_owned),
                    );
                }
            }
        }

        let mut collection = self.evaluate(source, ctx);
        if !params.taxonomies.is_empty() {
            collection = collection.filter_taxonomies(&params.taxonomies);
        }
        collection = collection.apply_filters(&params.filter);

        if let Some(range) = &params.date_range {
            let fmt = Some(self.config().pages.date_format.as_str());
            let bound = |value: &Option<Value>| match value {
                None | Some(Value::Null) => Some(None),
                Some(value) => date::value_to_timestamp(value, fmt).map(Some),
            };
            match (bound(&range.start), bound(&range.end)) {
                (Some(start), Some(end)) => {
                    collection =
                        collection.date_range(start.unwrap_or(0), end, range.field.as_deref());
                }
                _ => log!("collection"; "skipping unparsable date range {:?}..{:?}", range.start, range.end),
            }
        }

        if let Some(order) = &params.order {
            let flags = order.sort_flags.as_ref().map(|f| f.resolve());
            collection = match collection.order(&order.by, &order.dir, &order.custom, flags) {
                Ok(ordered) => ordered,
                Err(err) => {
                    log!("collection"; "order by `{}` skipped: {err:#}", order.by);
                    collection
                }
            };
        }

        let limit = params.limit.unwrap_or(self.config().pagination.limit);
        if params.pagination.unwrap_or(ctx.pagination) && limit > 0 && collection.len() > limit {
            let offset = if params.pagination == Some(true) {
                ctx.page.saturating_sub(1) * limit
            } else {
                0
            };
            collection = collection.slice(offset, limit);
        }

        collection.with_params(params)
    }

    /// Seed items of a specifier.
    pub fn evaluate(&self, source: &ItemSource, ctx: &QueryContext) -> Collection<'_> {
        let items = match self.seed(source, ctx) {
            Ok(items) => items,
            Err(err) => {
                log!("collection"; "{source:?}: {err:#}");
                Vec::new()
            }
        };
        Collection::new(self, items)
    }

    fn seed(&self, source: &ItemSource, ctx: &QueryContext) -> anyhow::Result<Vec<ChildEntry>> {
        match source {
            ItemSource::Pages { scope, relation } => {
                let page = match scope {
                    Scope::Current => ctx.current.as_deref().and_then(|r| self.find(r)),
                    Scope::Page(route) => self.find(route),
                    Scope::Root => self.root(),
                };
                match page {
                    Some(page) => self.related(page, *relation),
                    None => Ok(Vec::new()),
                }
            }
            ItemSource::Taxonomy { query, operator } => Ok(self
                .taxonomy()
                .find(query, *operator)
                .iter()
                .filter_map(|path| self.get(path))
                .map(entry)
                .collect()),
            ItemSource::Union(parts) => {
                let mut union = Collection::new(self, Vec::new());
                for part in parts {
                    union = union.union(self.evaluate(part, ctx));
                }
                Ok(union.items().to_vec())
            }
            ItemSource::Unknown(_) => Ok(Vec::new()),
        }
    }

    fn related(&self, page: &Document, relation: Relation) -> anyhow::Result<Vec<ChildEntry>> {
        let children = || self.children(&page.path);
        Ok(match relation {
            Relation::All => children()?.items().to_vec(),
            Relation::Modular => children()?.modular().items().to_vec(),
            Relation::Children => children()?.non_modular().items().to_vec(),
            Relation::Page => vec![entry(page)],
            Relation::Parent => match page.parent.as_deref().and_then(|p| self.get(p)) {
                Some(parent) if !parent.root => vec![entry(parent)],
                _ => Vec::new(),
            },
            Relation::Siblings => match page.parent.as_deref() {
                Some(parent) => self.children(parent)?.remove(&page.path).items().to_vec(),
                None => Vec::new(),
            },
            Relation::Descendants => self
                .all(Some(&page.path))?
                .remove(&page.path)
                .non_modular()
                .items()
                .to_vec(),
        })
    }
}

fn entry(doc: &Document) -> ChildEntry {
    ChildEntry {
        path: doc.path.clone(),
        slug: doc.slug.clone(),
    }
}
