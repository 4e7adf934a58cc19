//! Front matter of a content file.
//!
//! Content files start with a YAML block fenced by `---` lines:
//!
//! ```text
//! ---
//! title: Hello
//! date: 2020-06-01
//! taxonomy:
//!     tag: [rust, cms]
//! ---
//! Body text...
//! ```
//!
//! The block is kept as a JSON object so it round-trips through index
//! snapshots unchanged. Accessors are tolerant: a `published: "false"`
//! string is read as a boolean, a scalar where a list is expected becomes a
//! one-element list.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed header fields of one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header(Map<String, Value>);

impl Header {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Split `text` into header and body.
    ///
    /// Text without a leading `---` fence has an empty header.
    pub fn parse_front_matter(text: &str) -> Result<(Self, &str)> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let Some(rest) = text
            .strip_prefix("---\n")
            .or_else(|| text.strip_prefix("---\r\n"))
        else {
            return Ok((Self::default(), text));
        };

        let (yaml, body) = match find_closing_fence(rest) {
            Some((end, body_start)) => (&rest[..end], &rest[body_start..]),
            None => (rest, ""),
        };

        Ok((Self::from_yaml(yaml)?, body))
    }

    /// Parse a YAML mapping into a header.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value =
            serde_yaml::from_str(yaml).context("invalid front matter")?;
        match yaml_to_json(value) {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => anyhow::bail!("front matter must be a mapping, found `{other}`"),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Dotted-path lookup: `get("routes.default")`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Whether `path` is present and not null.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some_and(|v| !v.is_null())
    }

    /// Scalar field as a string; numbers and booleans are stringified.
    pub fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Boolean field, accepting `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`.
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// List field; a scalar becomes a one-element list, null an empty one.
    pub fn get_list(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(value) => scalar_to_string(value).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

/// Sort/compare view of a header value.
///
/// Lists are joined with `,`, `false`/null/empty become `None`.
pub fn value_to_sort_key(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Bool(true) => Some("1".into()),
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
            (!joined.is_empty()).then(|| joined.join(","))
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Object(_) => Some(value.to_string()),
        other => scalar_to_string(other),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Byte offsets of the closing `---` line: (end of YAML, start of body).
fn find_closing_fence(rest: &str) -> Option<(usize, usize)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some((offset, offset + line.len()));
        }
        offset += line.len();
    }
    None
}

/// Convert YAML to JSON, stringifying non-string mapping keys.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Y;
    match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(items.into_iter().map(yaml_to_json).collect()),
        Y::Mapping(map) => Value::Object(
            map.into_iter()
                .filter_map(|(k, v)| {
                    let key = match k {
                        Y::String(s) => s,
                        Y::Number(n) => n.to_string(),
                        Y::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((key, yaml_to_json(v)))
                })
                .collect(),
        ),
        Y::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_front_matter() {
        let text = "---\ntitle: Hello\ndate: 2020-06-01\n---\nBody here\n";
        let (header, body) = Header::parse_front_matter(text).unwrap();
        assert_eq!(header.get_str("title").as_deref(), Some("Hello"));
        assert_eq!(header.get_str("date").as_deref(), Some("2020-06-01"));
        assert_eq!(body, "Body here\n");
    }

    #[test]
    fn test_parse_without_front_matter() {
        let (header, body) = Header::parse_front_matter("# Just markdown").unwrap();
        assert!(header.is_empty());
        assert_eq!(body, "# Just markdown");
    }

    #[test]
    fn test_parse_crlf_and_unclosed() {
        let (header, body) = Header::parse_front_matter("---\r\ntitle: X\r\n---\r\nbody").unwrap();
        assert_eq!(header.get_str("title").as_deref(), Some("X"));
        assert_eq!(body, "body");

        let (header, body) = Header::parse_front_matter("---\ntitle: Y\n").unwrap();
        assert_eq!(header.get_str("title").as_deref(), Some("Y"));
        assert_eq!(body, "");
    }

    #[test]
    fn test_parse_invalid_yaml() {
        assert!(Header::parse_front_matter("---\ntitle: [unclosed\n---\n").is_err());
        assert!(Header::from_yaml("- a\n- b").is_err());
    }

    #[test]
    fn test_dotted_get() {
        let header = Header::from_yaml(
            "routes:\n  default: /x\n  aliases: [/a, /b]\ntaxonomy:\n  tag: rust\n",
        )
        .unwrap();
        assert_eq!(header.get_str("routes.default").as_deref(), Some("/x"));
        assert_eq!(header.get_str("routes.aliases.1").as_deref(), Some("/b"));
        assert_eq!(header.get_list("routes.aliases"), vec!["/a", "/b"]);
        assert_eq!(header.get_list("taxonomy.tag"), vec!["rust"]);
        assert!(header.get("routes.missing").is_none());
        assert!(header.contains("taxonomy"));
    }

    #[test]
    fn test_get_bool_tolerant() {
        let header = Header::from_yaml("a: true\nb: 'false'\nc: 0\nd: yes\ne: maybe\n").unwrap();
        assert_eq!(header.get_bool("a"), Some(true));
        assert_eq!(header.get_bool("b"), Some(false));
        assert_eq!(header.get_bool("c"), Some(false));
        // `yes` is a plain string in YAML 1.2
        assert_eq!(header.get_bool("d"), Some(true));
        assert_eq!(header.get_bool("e"), None);
        assert_eq!(header.get_bool("missing"), None);
    }

    #[test]
    fn test_numeric_keys_stringified() {
        let header = Header::from_yaml("1: one\nsub:\n  2: two\n").unwrap();
        assert_eq!(header.get_str("1").as_deref(), Some("one"));
        assert_eq!(header.get_str("sub.2").as_deref(), Some("two"));
    }

    #[test]
    fn test_value_to_sort_key() {
        assert_eq!(value_to_sort_key(&json!("abc")), Some("abc".into()));
        assert_eq!(value_to_sort_key(&json!(3)), Some("3".into()));
        assert_eq!(value_to_sort_key(&json!(["a", "b"])), Some("a,b".into()));
        assert_eq!(value_to_sort_key(&json!("")), None);
        assert_eq!(value_to_sort_key(&json!(false)), None);
        assert_eq!(value_to_sort_key(&json!(null)), None);
    }

    #[test]
    fn test_serde_transparent() {
        let header = Header::from_yaml("title: T").unwrap();
        let json = serde_json::to_string(&header).unwrap();
        assert_eq!(json, r#"{"title":"T"}"#);
        let back: Header = serde_json::from_str(&json).unwrap();
        assert_eq!(back, header);
    }
}
