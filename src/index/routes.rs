//! Route index and dispatch.
//!
//! Every page except the root registers its default route, its raw route
//! (folder slugs) when different, its canonical route and each alias. The
//! home page is additionally served at `/`.
//!
//! Dispatch resolution order:
//! 1. exact route (URL-decoded), then without a trailing `/`
//! 2. a routable page with a `redirect` header redirects
//! 3. missing or non-routable:
//!    - page with visible children → redirect to the first one
//!    - exact `[[site.redirects]]` alias → redirect
//!    - first `[[site.redirects]]` pattern that changes the route → redirect
//!    - exact `[[site.routes]]` alias, then patterns → dispatch again
//! 4. nothing matched → not found

use super::{Instances, PageIndex, error::IndexError};
use crate::config::{RouteRule, SiteSettings};
use crate::log;
use crate::page::Document;
use anyhow::{Result, bail};
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Route string → storage path.
pub type RouteMap = BTreeMap<String, String>;

/// Rewrites may chain; more hops than this is treated as a loop.
pub const MAX_HOPS: usize = 10;

/// Build the route map. `home` is the home page's route (`/home`).
pub fn build_routes(instances: &Instances, home: &str) -> RouteMap {
    let mut routes = RouteMap::new();

    for doc in instances.values().filter(|doc| !doc.root) {
        routes.insert(doc.route.clone(), doc.path.clone());
        if !doc.raw_route.is_empty() && doc.raw_route != doc.route {
            routes.insert(doc.raw_route.clone(), doc.path.clone());
        }
        if let Some(canonical) = &doc.canonical_route
            && *canonical != doc.route
        {
            routes.insert(canonical.clone(), doc.path.clone());
        }
        for alias in &doc.route_aliases {
            routes.insert(alias.clone(), doc.path.clone());
        }
    }

    if let Some(path) = routes.get(home).cloned() {
        routes.insert("/".to_owned(), path);
    }
    routes
}

/// Outcome of [`PageIndex::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<'a> {
    Found(&'a Document),
    Redirect(String),
    NotFound,
}

// ============================================================================
// Pattern Rules
// ============================================================================

struct CompiledRule {
    pattern: Regex,
    replacement: String,
}

/// Compiled `[[site.redirects]]` and `[[site.routes]]` tables.
pub struct RouteRules {
    redirects: Vec<CompiledRule>,
    rewrites: Vec<CompiledRule>,
}

impl RouteRules {
    /// Compile both tables. A rule that fails to compile is logged and left out.
    pub fn compile(site: &SiteSettings) -> Self {
        Self {
            redirects: compile_rules("site.redirects", &site.redirects),
            rewrites: compile_rules("site.routes", &site.routes),
        }
    }

    /// First redirect pattern whose substitution changes `route`.
    pub fn redirect(&self, route: &str) -> Option<String> {
        first_change(&self.redirects, route).next()
    }

    /// Every rewrite whose substitution changes `route`, in order.
    pub fn rewrites<'r>(&'r self, route: &'r str) -> impl Iterator<Item = String> + 'r {
        first_change(&self.rewrites, route)
    }
}

fn compile_rules(table: &str, rules: &[RouteRule]) -> Vec<CompiledRule> {
    rules
        .iter()
        .filter_map(|rule| {
            let pattern = format!("^{}", rule.from.trim_start_matches('^'));
            match Regex::new(&pattern) {
                Ok(pattern) => Some(CompiledRule {
                    pattern,
                    replacement: braced_groups(&rule.to),
                }),
                Err(err) => {
                    log!("error"; "{table}: skipping `{}`: {err}", rule.from);
                    None
                }
            }
        })
        .collect()
}

fn first_change<'r>(
    rules: &'r [CompiledRule],
    route: &'r str,
) -> impl Iterator<Item = String> + 'r {
    rules.iter().filter_map(move |rule| {
        let replaced = rule.pattern.replace(route, rule.replacement.as_str());
        (replaced != route).then(|| replaced.into_owned())
    })
}

/// `$1` → `${1}`, so a group reference followed by text stays numeric.
fn braced_groups(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut chars = replacement.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(char::is_ascii_digit) {
            out.push_str("${");
            while let Some(d) = chars.next_if(char::is_ascii_digit) {
                out.push(d);
            }
            out.push('}');
        } else {
            out.push(c);
        }
    }
    out
}

fn decode(route: &str) -> Cow<'_, str> {
    urlencoding::decode(route).unwrap_or(Cow::Borrowed(route))
}

// ============================================================================
// Lookup and Dispatch
// ============================================================================

impl PageIndex {
    /// Page registered under `route`, routable or not. No redirects apply.
    pub fn find(&self, route: &str) -> Option<&Document> {
        self.lookup(&decode(route))
    }

    /// `find` without percent-decoding.
    fn lookup(&self, route: &str) -> Option<&Document> {
        let path = self.routes.get(route).or_else(|| {
            let trimmed = route.trim_end_matches('/');
            (trimmed.len() < route.len()).then(|| self.routes.get(trimmed)).flatten()
        })?;
        self.instances.get(path)
    }

    /// Resolve a request route, following redirect and rewrite rules.
    ///
    /// The route is percent-decoded once; aliases and rules see the decoded
    /// form.
    pub fn dispatch(&self, route: &str) -> Result<Dispatch<'_>> {
        self.resolve(&decode(route), 0)
    }

    fn resolve(&self, route: &str, hops: usize) -> Result<Dispatch<'_>> {
        if hops > MAX_HOPS {
            bail!(IndexError::RewriteLoop {
                route: route.to_owned(),
                hops,
            });
        }

        let page = self.lookup(route);
        if let Some(page) = page
            && page.routable
        {
            return Ok(match &page.redirect {
                Some(target) => Dispatch::Redirect(target.clone()),
                None => Dispatch::Found(page),
            });
        }

        if let Some(page) = page
            && let Some(child) = self.first_visible_child(&page.path)?
        {
            return Ok(Dispatch::Redirect(child.route.clone()));
        }

        let site = &self.config.site;
        if let Some(target) = site.redirect_alias(route) {
            return Ok(Dispatch::Redirect(target.to_owned()));
        }

        let rules = self.rules();
        if let Some(target) = rules.redirect(route) {
            return Ok(Dispatch::Redirect(target));
        }

        if let Some(target) = site.route_alias(route) {
            return self.resolve(target, hops + 1);
        }
        for target in rules.rewrites(route) {
            match self.resolve(&target, hops + 1)? {
                Dispatch::NotFound => continue,
                found => return Ok(found),
            }
        }

        Ok(Dispatch::NotFound)
    }

    fn first_visible_child(&self, path: &str) -> Result<Option<&Document>> {
        let children = self.sorted_children(path)?;
        Ok(children
            .iter()
            .filter_map(|c| self.instances.get(&c.path))
            .find(|doc| doc.visible))
    }
}
