//! Path resolution over the content store.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};

use crate::application::handler::{ContentHandler, HandlerError};
use crate::application::store::{ContentStore, StoreError, StoreVersion};
use crate::cache::{CacheBackend, Lookup, Memoizer};
use crate::domain::{
    article::Article,
    comment::{Comment, Provenance},
    path::{RequestTarget, join},
};

const SOURCE: &str = "application::blog";

#[derive(Debug, Error)]
pub enum BlogError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// One article entry of a section listing.
#[derive(Debug, Clone)]
pub struct ListedArticle {
    pub name: String,
    pub path: String,
    /// `None` when the listed name has no content in the store.
    pub article: Option<Arc<Article>>,
}

#[derive(Debug, Clone)]
pub struct SectionListing {
    pub path: String,
    /// Ascending.
    pub sections: Vec<String>,
    /// Descending by name.
    pub articles: Vec<ListedArticle>,
}

/// Outcome of resolving a request path.
#[derive(Debug, Clone)]
pub enum Resolution {
    NotFound,
    Listing(SectionListing),
    Feed(SectionListing),
    Article { path: String, article: Arc<Article> },
}

impl Resolution {
    pub fn kind(&self) -> &'static str {
        match self {
            Resolution::NotFound => "not_found",
            Resolution::Listing(_) => "listing",
            Resolution::Feed(_) => "feed",
            Resolution::Article { article, .. } if article.is_binary() => "binary",
            Resolution::Article { .. } => "document",
        }
    }
}

/// Store, content handler and lookup cache, built once at startup.
pub struct Blog {
    store: Arc<dyn ContentStore>,
    handler: Arc<dyn ContentHandler>,
    memo: Memoizer,
}

impl Blog {
    pub fn new(
        store: Arc<dyn ContentStore>,
        handler: Arc<dyn ContentHandler>,
        cache: Option<Arc<dyn CacheBackend>>,
    ) -> Self {
        let memo = Memoizer::new(Arc::clone(&store), cache);
        Self {
            store,
            handler,
            memo,
        }
    }

    /// Pin the current store version for a batch of lookups.
    ///
    /// Everything read through one snapshot is keyed on the same version, so
    /// a request costs one version check however many lookups it makes.
    pub async fn snapshot(&self) -> Result<Snapshot<'_>, BlogError> {
        let version = self.memo.pin().await?;
        Ok(Snapshot {
            blog: self,
            version,
        })
    }

    pub async fn sections(&self, path: &str) -> Result<Vec<String>, BlogError> {
        self.snapshot().await?.sections(path).await
    }

    pub async fn articles(&self, path: &str) -> Result<Vec<String>, BlogError> {
        self.snapshot().await?.articles(path).await
    }

    pub async fn article(&self, path: &str) -> Result<Option<Arc<Article>>, BlogError> {
        self.snapshot().await?.article(path).await
    }

    pub async fn menu(&self) -> Result<Vec<String>, BlogError> {
        self.snapshot().await?.menu().await
    }

    pub async fn resolve(&self, path: &str) -> Result<Resolution, BlogError> {
        self.snapshot().await?.resolve(path).await
    }

    pub fn raw_data(&self, article: &Article) -> Bytes {
        self.handler.raw_data(article)
    }

    /// Append `comment` to the stored article and write it back.
    ///
    /// Reads the raw bytes straight from the store so the write is based on
    /// the latest content rather than a cached decode. Returns `false` when
    /// the article vanished or the store refused the write.
    pub async fn submit_comment(
        &self,
        path: &str,
        comment: &Comment,
        provenance: &Provenance,
    ) -> Result<bool, BlogError> {
        let Some(raw) = self.store.get_article(path).await? else {
            warn!(target: SOURCE, path, "comment target disappeared before write");
            return Ok(false);
        };

        let updated = self.handler.append_comment(&raw, comment)?;
        let written = self
            .store
            .set_article(path, updated, &provenance.commit_message())
            .await?;

        info!(
            target: SOURCE,
            path,
            written,
            remote_addr = provenance.remote_addr.as_deref().unwrap_or_default(),
            "comment submitted"
        );
        Ok(written)
    }

    async fn load_sections(&self, path: &str) -> Result<Vec<String>, BlogError> {
        let names = self.store.sections(path).await?;
        Ok(self.handler.filter_sections(names))
    }

    async fn load_articles(&self, path: &str) -> Result<Vec<String>, BlogError> {
        let names = self.store.articles(path).await?;
        Ok(self.handler.filter_articles(names))
    }

    async fn load_article(&self, path: &str) -> Result<Option<Arc<Article>>, BlogError> {
        match self.store.get_article(path).await? {
            Some(raw) if !raw.is_empty() => {
                let article = self.handler.decode(path, raw)?;
                Ok(Some(Arc::new(article)))
            }
            _ => Ok(None),
        }
    }
}

/// Read view of a [`Blog`] pinned to one store version.
pub struct Snapshot<'a> {
    blog: &'a Blog,
    version: Option<StoreVersion>,
}

impl Snapshot<'_> {
    /// Visible subsections of `path`.
    pub async fn sections(&self, path: &str) -> Result<Vec<String>, BlogError> {
        self.blog
            .memo
            .call(self.version.as_ref(), Lookup::Sections, path, || {
                self.blog.load_sections(path)
            })
            .await
    }

    /// Visible articles of `path`.
    pub async fn articles(&self, path: &str) -> Result<Vec<String>, BlogError> {
        self.blog
            .memo
            .call(self.version.as_ref(), Lookup::Articles, path, || {
                self.blog.load_articles(path)
            })
            .await
    }

    /// Decoded article at `path`; `None` when the store has no bytes for it.
    pub async fn article(&self, path: &str) -> Result<Option<Arc<Article>>, BlogError> {
        self.blog
            .memo
            .call(self.version.as_ref(), Lookup::Article, path, || {
                self.blog.load_article(path)
            })
            .await
    }

    /// Top-level sections shown in the site menu.
    pub async fn menu(&self) -> Result<Vec<String>, BlogError> {
        self.sections("").await
    }

    pub async fn resolve(&self, path: &str) -> Result<Resolution, BlogError> {
        match RequestTarget::classify(path) {
            RequestTarget::Article { path } => self.resolve_article(&path).await,
            RequestTarget::Section {
                path: section,
                feed,
            } => {
                let sections = self.sections(&section).await?;
                let articles = self.articles(&section).await?;

                if sections.is_empty() && articles.is_empty() {
                    return Ok(Resolution::NotFound);
                }

                if sections.is_empty() && articles.len() == 1 {
                    if feed {
                        return Ok(Resolution::NotFound);
                    }
                    let target = join(&section, &articles[0]);
                    return self.resolve_article(&target).await;
                }

                let listing = self.listing(section, sections, articles).await?;
                Ok(if feed {
                    Resolution::Feed(listing)
                } else {
                    Resolution::Listing(listing)
                })
            }
        }
    }

    async fn resolve_article(&self, path: &str) -> Result<Resolution, BlogError> {
        match self.article(path).await? {
            Some(article) => Ok(Resolution::Article {
                path: path.to_string(),
                article,
            }),
            None => {
                warn!(target: SOURCE, path, "article has no content");
                Ok(Resolution::NotFound)
            }
        }
    }

    async fn listing(
        &self,
        section: String,
        mut sections: Vec<String>,
        mut names: Vec<String>,
    ) -> Result<SectionListing, BlogError> {
        sections.sort();
        names.sort_by(|a, b| b.cmp(a));

        let mut articles = Vec::with_capacity(names.len());
        for name in names {
            let path = join(&section, &name);
            let article = self.article(&path).await?;
            articles.push(ListedArticle {
                name,
                path,
                article,
            });
        }

        Ok(SectionListing {
            path: section,
            sections,
            articles,
        })
    }
}
