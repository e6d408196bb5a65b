use std::collections::BTreeMap;

use bytes::Bytes;

/// Metadata parsed from the head of a document. Keys are lower-cased and a key
/// may carry several lines of values.
pub type Metadata = BTreeMap<String, Vec<String>>;

/// Structured article content ready for templating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Rendered, sanitized HTML.
    pub html: String,
    pub metadata: Metadata,
    /// Bytes exactly as they came out of the store.
    pub raw: Bytes,
}

impl Document {
    /// All values of a metadata key joined with a single space.
    pub fn meta(&self, key: &str) -> Option<String> {
        self.metadata
            .get(key)
            .filter(|values| !values.is_empty())
            .map(|values| values.join(" "))
    }

    pub fn title(&self) -> Option<String> {
        self.meta("title")
    }
}

/// A decoded article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Article {
    /// Served to clients untouched.
    Binary(Bytes),
    Document(Document),
}

impl Article {
    pub fn raw(&self) -> &Bytes {
        match self {
            Article::Binary(data) => data,
            Article::Document(document) => &document.raw,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Article::Document(document) => Some(document),
            Article::Binary(_) => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Article::Binary(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_joins_multiline_values() {
        let mut metadata = Metadata::new();
        metadata.insert(
            "title".to_string(),
            vec!["Hello".to_string(), "World".to_string()],
        );
        metadata.insert("empty".to_string(), Vec::new());
        let document = Document {
            html: String::new(),
            metadata,
            raw: Bytes::new(),
        };

        assert_eq!(document.title().as_deref(), Some("Hello World"));
        assert!(document.meta("empty").is_none());
        assert!(document.meta("missing").is_none());
    }

    #[test]
    fn raw_is_available_for_both_variants() {
        let binary = Article::Binary(Bytes::from_static(b"\x89PNG"));
        assert_eq!(binary.raw().as_ref(), b"\x89PNG");
        assert!(binary.as_document().is_none());

        let document = Article::Document(Document {
            html: "<p>x</p>".to_string(),
            metadata: Metadata::new(),
            raw: Bytes::from_static(b"x"),
        });
        assert_eq!(document.raw().as_ref(), b"x");
        assert!(!document.is_binary());
    }
}
