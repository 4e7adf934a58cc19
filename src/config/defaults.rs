//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [pages] Section Defaults
// ============================================================================

pub mod pages {
    use std::path::PathBuf;

    pub fn root() -> PathBuf {
        "pages".into()
    }

    pub fn extensions() -> Vec<String> {
        vec![".md".into()]
    }

    pub fn ignore_files() -> Vec<String> {
        vec![".DS_Store".into()]
    }

    pub fn ignore_folders() -> Vec<String> {
        vec![".git".into(), ".idea".into()]
    }

    pub fn param_sep() -> String {
        ":".into()
    }

    pub fn hidden_marker() -> String {
        ".".into()
    }

    pub fn hide_marker() -> String {
        "_".into()
    }

    pub fn modular_template() -> String {
        "modular".into()
    }

    pub fn locale() -> String {
        "en_US".into()
    }

    pub fn date_format() -> String {
        "%d-%m-%Y %H:%M".into()
    }

    pub mod order {
        pub fn by() -> String {
            "default".into()
        }

        pub fn dir() -> String {
            "asc".into()
        }
    }
}

// ============================================================================
// [cache] Section Defaults
// ============================================================================

pub mod cache {
    pub fn dir() -> String {
        ".cache/pages".into()
    }
}

// ============================================================================
// [home] / [language] Section Defaults
// ============================================================================

pub mod home {
    pub fn alias() -> String {
        "/home".into()
    }
}

pub mod language {
    pub fn code() -> String {
        "en".into()
    }
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    pub fn taxonomies() -> Vec<String> {
        vec!["category".into(), "tag".into()]
    }
}
