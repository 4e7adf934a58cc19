//! Structural index failures.

use thiserror::Error;

/// Errors that make an index unusable.
///
/// Raised with `bail!` so callers holding an `anyhow::Error` can
/// `downcast_ref::<IndexError>()`.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("duplicate page path `{0}`")]
    DuplicatePath(String),

    #[error("`{container}` lists child `{child}` which is not indexed")]
    MissingChild { container: String, child: String },

    #[error("route `{route}` still rewriting after {hops} hops")]
    RewriteLoop { route: String, hops: usize },

    #[error("page source: {0}")]
    Source(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    fn fail() -> anyhow::Result<()> {
        bail!(IndexError::RewriteLoop {
            route: "/a".into(),
            hops: 10
        })
    }

    #[test]
    fn test_downcast_from_anyhow() {
        let err = fail().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<IndexError>(),
            Some(IndexError::RewriteLoop { hops: 10, .. })
        ));
        assert_eq!(err.to_string(), "route `/a` still rewriting after 10 hops");
    }
}
