//! Errors raised while loading `site.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read site config `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed site config")]
    Toml(#[from] toml::de::Error),

    /// A value serde accepted but the index cannot work with.
    #[error("[{section}] {message}")]
    Invalid {
        section: &'static str,
        message: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            message: message.into(),
        }
    }
}
