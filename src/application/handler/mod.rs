//! Content handlers turn raw store bytes into articles and back.

mod markdown;
mod markup;
mod plain;

use std::{fmt, str::FromStr, string::FromUtf8Error, sync::Arc};

use bytes::Bytes;
use thiserror::Error;

use crate::domain::{article::Article, comment::Comment};

pub use markdown::MarkdownHandler;
pub use plain::PlainHandler;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("article `{path}` is not valid UTF-8")]
    Encoding {
        path: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error("markup processing failed: {message}")]
    Markup { message: String },
}

/// Interprets stored bytes for presentation and folds comments back into them.
pub trait ContentHandler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Drop section names that should not be listed.
    fn filter_sections(&self, names: Vec<String>) -> Vec<String> {
        names
    }

    /// Drop article names that should not be listed.
    fn filter_articles(&self, names: Vec<String>) -> Vec<String> {
        names
    }

    fn decode(&self, path: &str, raw: Bytes) -> Result<Article, HandlerError>;

    /// Raw bytes with the comment appended, ready to be written back.
    fn append_comment(&self, raw: &[u8], comment: &Comment) -> Result<Bytes, HandlerError>;

    fn raw_data(&self, article: &Article) -> Bytes {
        article.raw().clone()
    }
}

/// Handler selection from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerKind {
    Plain,
    #[default]
    Markdown,
}

impl HandlerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HandlerKind::Plain => "plain",
            HandlerKind::Markdown => "markdown",
        }
    }

    pub fn build(self) -> Arc<dyn ContentHandler> {
        match self {
            HandlerKind::Plain => Arc::new(PlainHandler),
            HandlerKind::Markdown => Arc::new(MarkdownHandler::new()),
        }
    }
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandlerKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(HandlerKind::Plain),
            "markdown" | "md" => Ok(HandlerKind::Markdown),
            other => Err(format!("unknown content handler `{other}`")),
        }
    }
}

pub(crate) fn decode_utf8(path: &str, raw: Bytes) -> Result<String, HandlerError> {
    String::from_utf8(raw.to_vec()).map_err(|source| HandlerError::Encoding {
        path: path.to_string(),
        source,
    })
}
