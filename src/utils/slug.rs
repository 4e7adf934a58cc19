//! Folder-name and slug helpers.
//!
//! Page folders carry optional numeric order prefixes (`01.blog`) that are
//! stripped for the public slug.

/// Characters forbidden in slugs supplied through headers
const FORBIDDEN_CHARS: &[char] = &[
    '<', '>', ':', '|', '?', '*', '#', '\\', '/', '(', ')', '[', ']', '\t', '\r', '\n',
];

// ============================================================================
// Order Prefix
// ============================================================================

/// Byte length of a `NN.` order prefix, if the folder name starts with one.
fn order_prefix_len(folder: &str) -> Option<usize> {
    let digits = folder.bytes().take_while(u8::is_ascii_digit).count();
    (digits > 0 && folder.as_bytes().get(digits) == Some(&b'.')).then_some(digits + 1)
}

/// Whether the folder name starts with a numeric order prefix.
pub fn has_order_prefix(folder: &str) -> bool {
    order_prefix_len(folder).is_some()
}

/// Strip a leading `NN.` order prefix: `01.blog` → `blog`.
pub fn strip_order_prefix(folder: &str) -> &str {
    match order_prefix_len(folder) {
        Some(len) => &folder[len..],
        None => folder,
    }
}

// ============================================================================
// Slugification
// ============================================================================

/// Slug derived from a folder name: order prefix removed, lowercased.
pub fn folder_slug(folder: &str) -> String {
    strip_order_prefix(folder).to_lowercase()
}

/// Clean a header-supplied slug: forbidden characters dropped, whitespace
/// collapsed to `-`.
pub fn sanitize_slug(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Fallback title: slug with its first character uppercased.
pub fn title_from_slug(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_prefix() {
        assert!(has_order_prefix("01.blog"));
        assert!(has_order_prefix("7.x"));
        assert!(!has_order_prefix("blog"));
        assert!(!has_order_prefix("01blog"));
        assert!(!has_order_prefix(".hidden"));
        assert_eq!(strip_order_prefix("01.blog"), "blog");
        assert_eq!(strip_order_prefix("blog"), "blog");
        assert_eq!(strip_order_prefix("2020.01.notes"), "01.notes");
    }

    #[test]
    fn test_folder_slug() {
        assert_eq!(folder_slug("02.About-Us"), "about-us");
        assert_eq!(folder_slug("_hero"), "_hero");
        assert_eq!(folder_slug(""), "");
    }

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("  My Post (draft) "), "My-Post-draft");
        assert_eq!(sanitize_slug("a/b?c"), "abc");
        assert_eq!(sanitize_slug("<>:?*#"), "");
        assert_eq!(sanitize_slug("你好 世界"), "你好-世界");
    }

    #[test]
    fn test_title_from_slug() {
        assert_eq!(title_from_slug("post-a"), "Post-a");
        assert_eq!(title_from_slug("élan"), "Élan");
        assert_eq!(title_from_slug(""), "");
    }
}
