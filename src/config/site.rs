//! `[site]`, `[home]`, `[language]` and `[pagination]` sections.
//!
//! These are the routing and presentation knobs consumed by the route
//! index and the collection pipeline.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// [site]
// ============================================================================

/// One `from` → `to` rule of the redirect or rewrite tables.
///
/// `from` is matched literally for exact aliases and as an anchored regex
/// for pattern rules. `to` may reference capture groups (`$1`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteRule {
    pub from: String,
    pub to: String,
}

/// `[site]` section in site.toml.
///
/// # Example
/// ```toml
/// [site]
/// taxonomies = ["category", "tag", "author"]
///
/// [[site.redirects]]
/// from = "/old-blog/(.*)"
/// to = "/blog/$1"
///
/// [[site.routes]]
/// from = "/latest"
/// to = "/blog/newest-post"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSettings {
    /// Taxonomy names recorded in the taxonomy map.
    #[serde(default = "defaults::site::taxonomies")]
    #[educe(Default = defaults::site::taxonomies())]
    pub taxonomies: Vec<String>,

    /// Read taxonomy filters from request URL parameters.
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub url_taxonomy_filters: bool,

    /// Ordered redirect rules, tried against non-routable or missing routes.
    #[serde(default)]
    pub redirects: Vec<RouteRule>,

    /// Ordered rewrite rules; a match is dispatched again.
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

impl SiteSettings {
    /// Exact-match rewrite target for `route`, if one is configured.
    pub fn route_alias(&self, route: &str) -> Option<&str> {
        self.routes
            .iter()
            .find(|rule| rule.from == route)
            .map(|rule| rule.to.as_str())
    }

    /// Exact-match redirect target for `route`, if one is configured.
    pub fn redirect_alias(&self, route: &str) -> Option<&str> {
        self.redirects
            .iter()
            .find(|rule| rule.from == route)
            .map(|rule| rule.to.as_str())
    }
}

// ============================================================================
// [home] / [language]
// ============================================================================

/// `[home]` section - which page is served at `/`.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct HomeConfig {
    #[serde(default = "defaults::home::alias")]
    #[educe(Default = defaults::home::alias())]
    pub alias: String,

    /// Per-locale home aliases, used only when languages are enabled.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// `[language]` section - active and default locale.
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub enabled: bool,

    #[serde(default = "defaults::language::code")]
    #[educe(Default = defaults::language::code())]
    pub active: String,

    #[serde(default = "defaults::language::code")]
    #[educe(Default = defaults::language::code())]
    pub default: String,
}

impl LanguageConfig {
    /// Locale identifier mixed into the cache digest.
    pub fn active_locale(&self) -> &str {
        if self.enabled { &self.active } else { "" }
    }

    /// Content extensions in priority order, with language variants first.
    ///
    /// For `.md` with active `fr` and default `en`:
    /// `[".fr.md", ".en.md", ".md"]`.
    pub fn fallback_extensions(&self, extensions: &[String]) -> Vec<String> {
        if !self.enabled {
            return extensions.to_vec();
        }

        let mut langs: Vec<&str> = Vec::with_capacity(2);
        for lang in [self.active.as_str(), self.default.as_str()] {
            if !lang.is_empty() && !langs.contains(&lang) {
                langs.push(lang);
            }
        }

        let mut out = Vec::with_capacity(extensions.len() * (langs.len() + 1));
        for ext in extensions {
            out.extend(langs.iter().map(|lang| format!(".{lang}{ext}")));
            out.push(ext.clone());
        }
        out
    }
}

impl HomeConfig {
    /// Resolve the home alias (without slashes) for the given language setup.
    ///
    /// Uses the active locale's alias, falling back to the default locale's
    /// when the active one has no entry.
    pub fn resolve(&self, language: &LanguageConfig) -> String {
        let mut home = self.alias.as_str();

        if language.enabled && !self.aliases.is_empty() {
            let active = (!language.active.is_empty())
                .then(|| self.aliases.get(&language.active))
                .flatten();
            if let Some(alias) = active.or_else(|| self.aliases.get(&language.default)) {
                home = alias;
            }
        }

        home.trim_matches('/').to_owned()
    }
}

// ============================================================================
// [pagination]
// ============================================================================

/// `[pagination]` section - defaults for collection pagination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationConfig {
    /// Default item limit; `0` means unlimited.
    #[serde(default)]
    pub limit: usize,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use super::*;

    #[test]
    fn test_site_rules_keep_order() {
        let config = r#"
            [site]
            taxonomies = ["category"]

            [[site.redirects]]
            from = "/a"
            to = "/b"

            [[site.redirects]]
            from = "^/old/(.*)"
            to = "/new/$1"

            [[site.routes]]
            from = "/latest"
            to = "/blog/post-b"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.site.taxonomies, vec!["category"]);
        assert_eq!(config.site.redirects.len(), 2);
        assert_eq!(config.site.redirects[1].from, "^/old/(.*)");
        assert_eq!(config.site.redirect_alias("/a"), Some("/b"));
        assert_eq!(config.site.route_alias("/latest"), Some("/blog/post-b"));
        assert_eq!(config.site.route_alias("/nope"), None);
    }

    #[test]
    fn test_home_resolve_plain() {
        let home = HomeConfig::default();
        assert_eq!(home.resolve(&LanguageConfig::default()), "home");
    }

    #[test]
    fn test_home_resolve_locale_fallback() {
        let config = r#"
            [home]
            alias = "/home"
            [home.aliases]
            en = "/welcome"
            de = "/willkommen"

            [language]
            enabled = true
            active = "fr"
            default = "en"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();
        // no `fr` alias: falls back to the default locale
        assert_eq!(config.home.resolve(&config.language), "welcome");

        let mut language = config.language.clone();
        language.active = "de".into();
        assert_eq!(config.home.resolve(&language), "willkommen");

        language.enabled = false;
        assert_eq!(config.home.resolve(&language), "home");
    }

    #[test]
    fn test_fallback_extensions() {
        let exts = vec![".md".to_string()];
        let mut language = LanguageConfig::default();
        assert_eq!(language.fallback_extensions(&exts), vec![".md"]);

        language.enabled = true;
        language.active = "fr".into();
        assert_eq!(
            language.fallback_extensions(&exts),
            vec![".fr.md", ".en.md", ".md"]
        );

        language.active = "en".into();
        assert_eq!(language.fallback_extensions(&exts), vec![".en.md", ".md"]);
    }

    #[test]
    fn test_pagination_default() {
        let config: SiteConfig = toml::from_str("[pagination]\nlimit = 10").unwrap();
        assert_eq!(config.pagination.limit, 10);
        assert_eq!(SiteConfig::default().pagination.limit, 0);
    }
}
