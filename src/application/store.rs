//! Content store trait describing the versioned storage collaborator.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(err: impl fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Opaque token that changes whenever store content changes.
///
/// Only ever compared for equality; never ordered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreVersion(String);

impl StoreVersion {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Display for StoreVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Versioned key-value storage holding sections and articles.
///
/// Implementations must return a new [`StoreVersion`] after every content
/// mutation; cached lookups are only ever invalidated by a version change.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn version(&self) -> Result<StoreVersion, StoreError>;

    /// Names of the subsections of `path`, each suffixed with `/`.
    async fn sections(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Names of the articles directly inside `path`.
    async fn articles(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Raw article bytes, `None` when nothing is stored at `path`.
    async fn get_article(&self, path: &str) -> Result<Option<Bytes>, StoreError>;

    /// Replace the article at `path`. Returns `false` when the write was refused.
    async fn set_article(&self, path: &str, data: Bytes, message: &str)
    -> Result<bool, StoreError>;
}
