//! In-memory content store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

use crate::application::store::{ContentStore, StoreError, StoreVersion};
use crate::cache::{rw_read, rw_write};
use crate::domain::path::SECTION_DELIMITER;

const SOURCE: &str = "infra::store::memory";

/// A write accepted by [`MemoryStore::set_article`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub path: String,
    pub message: String,
}

/// Map of article path to bytes. Every mutation advances the version.
#[derive(Debug, Default)]
pub struct MemoryStore {
    articles: RwLock<BTreeMap<String, Bytes>>,
    commits: RwLock<Vec<CommitRecord>>,
    version: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles<I, P, D>(articles: I) -> Self
    where
        I: IntoIterator<Item = (P, D)>,
        P: Into<String>,
        D: Into<Bytes>,
    {
        let store = Self::new();
        for (path, data) in articles {
            store.insert(path, data);
        }
        store
    }

    /// Create or replace an article outside the comment flow.
    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        rw_write(&self.articles, SOURCE, "insert").insert(path.into(), data.into());
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn commits(&self) -> Vec<CommitRecord> {
        rw_read(&self.commits, SOURCE, "commits").clone()
    }

    fn children(&self, path: &str) -> (BTreeSet<String>, BTreeSet<String>) {
        let prefix = if path.is_empty() || path.ends_with(SECTION_DELIMITER) {
            path.to_string()
        } else {
            format!("{path}{SECTION_DELIMITER}")
        };

        let mut sections = BTreeSet::new();
        let mut articles = BTreeSet::new();
        for key in rw_read(&self.articles, SOURCE, "children").keys() {
            let Some(rest) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            match rest.find(SECTION_DELIMITER) {
                Some(idx) => {
                    sections.insert(rest[..=idx].to_string());
                }
                None if !rest.is_empty() => {
                    articles.insert(rest.to_string());
                }
                None => {}
            }
        }
        (sections, articles)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn version(&self) -> Result<StoreVersion, StoreError> {
        Ok(StoreVersion::new(
            self.version.load(Ordering::SeqCst).to_string(),
        ))
    }

    async fn sections(&self, path: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.children(path).0.into_iter().collect())
    }

    async fn articles(&self, path: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.children(path).1.into_iter().collect())
    }

    async fn get_article(&self, path: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(rw_read(&self.articles, SOURCE, "get_article")
            .get(path)
            .cloned())
    }

    async fn set_article(
        &self,
        path: &str,
        data: Bytes,
        message: &str,
    ) -> Result<bool, StoreError> {
        {
            let mut articles = rw_write(&self.articles, SOURCE, "set_article");
            let Some(slot) = articles.get_mut(path) else {
                return Ok(false);
            };
            *slot = data;
        }
        self.version.fetch_add(1, Ordering::SeqCst);
        rw_write(&self.commits, SOURCE, "set_article.commit").push(CommitRecord {
            path: path.to_string(),
            message: message.to_string(),
        });
        Ok(true)
    }
}
