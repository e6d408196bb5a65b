use bytes::Bytes;

use crate::domain::{
    article::{Article, Document, Metadata},
    comment::Comment,
};

use super::{
    ContentHandler, HandlerError, decode_utf8,
    markup::{escape_html, strip_markup},
};

/// Treats every article as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainHandler;

impl ContentHandler for PlainHandler {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn decode(&self, path: &str, raw: Bytes) -> Result<Article, HandlerError> {
        let text = decode_utf8(path, raw.clone())?;
        Ok(Article::Document(Document {
            html: format!("<pre class=\"blogpit-plain\">{}</pre>", escape_html(&text)),
            metadata: Metadata::new(),
            raw,
        }))
    }

    fn append_comment(&self, raw: &[u8], comment: &Comment) -> Result<Bytes, HandlerError> {
        let name = strip_markup(&comment.name)?;
        let content = strip_markup(&comment.content)?;

        let mut data = raw.to_vec();
        data.extend_from_slice(format!("\n<br/>{name}<br/>\n{content}").as_bytes());
        Ok(Bytes::from(data))
    }
}
