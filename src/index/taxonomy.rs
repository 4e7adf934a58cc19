//! Taxonomy map: taxonomy name → term → pages.

use super::Instances;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How several requested terms combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Operator {
    #[default]
    And,
    Or,
}

impl Operator {
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("or") {
            Self::Or
        } else {
            Self::And
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxonomyMap(BTreeMap<String, BTreeMap<String, BTreeSet<String>>>);

impl TaxonomyMap {
    /// Record the configured taxonomies of every published page.
    pub fn build(instances: &Instances, names: &[String]) -> Self {
        let mut map: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for doc in instances.values().filter(|doc| doc.published) {
            for (name, terms) in &doc.taxonomy {
                if !names.contains(name) {
                    continue;
                }
                let by_term = map.entry(name.clone()).or_default();
                for term in terms {
                    by_term
                        .entry(term.clone())
                        .or_default()
                        .insert(doc.path.clone());
                }
            }
        }
        Self(map)
    }

    /// Pages tagged with `term` under `name`.
    pub fn pages(&self, name: &str, term: &str) -> Option<&BTreeSet<String>> {
        self.0.get(name)?.get(term)
    }

    /// Terms of `name` with their page counts.
    pub fn terms(&self, name: &str) -> BTreeMap<&str, usize> {
        self.0
            .get(name)
            .map(|terms| terms.iter().map(|(t, pages)| (t.as_str(), pages.len())).collect())
            .unwrap_or_default()
    }

    /// Pages matching `query` (name → terms), combined with `op`.
    ///
    /// An empty query matches nothing.
    pub fn find(&self, query: &BTreeMap<String, Vec<String>>, op: Operator) -> BTreeSet<String> {
        let mut sets = query
            .iter()
            .flat_map(|(name, terms)| terms.iter().map(move |term| (name, term)))
            .map(|(name, term)| self.pages(name, term).cloned().unwrap_or_default());

        let Some(first) = sets.next() else {
            return BTreeSet::new();
        };
        sets.fold(first, |acc, set| match op {
            Operator::And => acc.intersection(&set).cloned().collect(),
            Operator::Or => acc.union(&set).cloned().collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::page::Document;

    fn tagged(path: &str, tags: &[&str], published: bool) -> Document {
        let config = SiteConfig::default();
        let root = Document::new_root("/p", &config);
        let mut doc = Document::new(path, path.trim_start_matches("/p/"), &root, &config);
        doc.published = published;
        doc.taxonomy.insert("tag".into(), tags.iter().map(|t| t.to_string()).collect());
        doc.taxonomy.insert("mood".into(), vec!["happy".into()]);
        doc
    }

    fn map() -> TaxonomyMap {
        let mut instances = Instances::new();
        for doc in [
            tagged("/p/a", &["rust", "cms"], true),
            tagged("/p/b", &["rust"], true),
            tagged("/p/c", &["cms"], true),
            tagged("/p/d", &["rust"], false),
        ] {
            instances.insert(doc.path.clone(), doc);
        }
        TaxonomyMap::build(&instances, &["tag".to_string()])
    }

    fn query(terms: &[&str]) -> BTreeMap<String, Vec<String>> {
        BTreeMap::from([("tag".to_string(), terms.iter().map(|t| t.to_string()).collect())])
    }

    #[test]
    fn test_build_skips_unpublished_and_unconfigured() {
        let map = map();
        assert_eq!(map.terms("tag"), BTreeMap::from([("cms", 2), ("rust", 2)]));
        assert!(map.terms("mood").is_empty());
    }

    #[test]
    fn test_find_and_or() {
        let map = map();
        let and: Vec<_> = map.find(&query(&["rust", "cms"]), Operator::And).into_iter().collect();
        assert_eq!(and, vec!["/p/a"]);

        let or: Vec<_> = map.find(&query(&["rust", "cms"]), Operator::Or).into_iter().collect();
        assert_eq!(or, vec!["/p/a", "/p/b", "/p/c"]);

        assert!(map.find(&query(&["nope"]), Operator::Or).is_empty());
        assert!(map.find(&BTreeMap::new(), Operator::And).is_empty());
        assert_eq!(Operator::parse("OR"), Operator::Or);
        assert_eq!(Operator::parse("whatever"), Operator::And);
    }
}
