//! Cache key definitions.
//!
//! Every key embeds the store version it was computed against, so entries
//! written before a store change can never be read after it.

use std::fmt;

use crate::application::store::StoreVersion;

/// The store lookups that go through the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// Filtered subsection names of a section.
    Sections,
    /// Filtered article names of a section.
    Articles,
    /// A decoded article.
    Article,
}

impl Lookup {
    pub fn name(self) -> &'static str {
        match self {
            Lookup::Sections => "sections",
            Lookup::Articles => "articles",
            Lookup::Article => "article",
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub lookup: Lookup,
    pub version: StoreVersion,
    pub path: String,
}

impl CacheKey {
    pub fn new(lookup: Lookup, version: StoreVersion, path: impl Into<String>) -> Self {
        Self {
            lookup,
            version,
            path: path.into(),
        }
    }
}

/// Renders as `lookup:version:path`.
impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.lookup, self.version, self.path)
    }
}
