use std::collections::HashSet;

use ammonia::Builder as AmmoniaBuilder;
use bytes::Bytes;
use comrak::options::Options;

use crate::domain::{
    article::{Article, Document, Metadata},
    comment::Comment,
    path::has_extension,
};

use super::{
    ContentHandler, HandlerError, decode_utf8,
    markup::{markdown_to_text, render_markdown},
};

/// Markdown articles with a leading `Key: value` metadata block.
///
/// Article names carrying a file extension are assets: they are hidden from
/// listings and served as binary content.
pub struct MarkdownHandler {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl MarkdownHandler {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }
}

impl Default for MarkdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHandler for MarkdownHandler {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn filter_articles(&self, names: Vec<String>) -> Vec<String> {
        names.into_iter().filter(|name| !has_extension(name)).collect()
    }

    fn decode(&self, path: &str, raw: Bytes) -> Result<Article, HandlerError> {
        if has_extension(path) {
            return Ok(Article::Binary(raw));
        }

        let text = decode_utf8(path, raw.clone())?;
        let (metadata, body) = split_metadata(&text);
        let rendered = render_markdown(&body, &self.options)?;
        let html = self.sanitizer.clean(&rendered).to_string();

        Ok(Article::Document(Document {
            html,
            metadata,
            raw,
        }))
    }

    /// Both fields go through Markdown and lose their markup, so the text that
    /// remains is already entity-encoded HTML.
    fn append_comment(&self, raw: &[u8], comment: &Comment) -> Result<Bytes, HandlerError> {
        let name = markdown_to_text(&comment.name)?;
        let content = markdown_to_text(&comment.content)?;

        let mut data = raw.to_vec();
        data.extend_from_slice(
            format!(
                "\n\n<h3 class=\"blogpit-comment\">{}</h3>\n\n{}\n",
                name.trim(),
                content.trim_end()
            )
            .as_bytes(),
        );
        Ok(Bytes::from(data))
    }
}

/// Separate the metadata head from the Markdown body.
///
/// An optional `---` line opens the head. Each `key: value` line starts a key,
/// lines indented by four or more spaces continue the previous key, and a
/// blank line or a `---`/`...` line closes it. A first line that is not
/// metadata means the document has none.
fn split_metadata(text: &str) -> (Metadata, String) {
    let mut metadata = Metadata::new();
    let mut lines = text.lines().peekable();

    if lines.peek().is_some_and(|line| is_fence(line, "---")) {
        lines.next();
    }

    let mut current: Option<String> = None;
    while let Some(line) = lines.peek().copied() {
        if line.trim().is_empty() || is_fence(line, "---") || is_fence(line, "...") {
            lines.next();
            break;
        }
        if let Some((key, value)) = parse_meta_line(line) {
            metadata.entry(key.clone()).or_default().push(value);
            current = Some(key);
        } else if let (Some(key), Some(value)) = (current.as_ref(), continuation(line)) {
            metadata.entry(key.clone()).or_default().push(value);
        } else {
            break;
        }
        lines.next();
    }

    let body = lines.collect::<Vec<_>>().join("\n");
    (metadata, body)
}

fn is_fence(line: &str, marker: &str) -> bool {
    match line.strip_prefix(marker) {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn parse_meta_line(line: &str) -> Option<(String, String)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    if indent > 3 {
        return None;
    }
    let (key, value) = line[indent..].split_once(':')?;
    let valid_key = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid_key.then(|| (key.to_ascii_lowercase(), value.trim().to_string()))
}

fn continuation(line: &str) -> Option<String> {
    line.starts_with("    ").then(|| line.trim().to_string())
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;
    ext.description_lists = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    let generic: HashSet<&'static str> =
        HashSet::from(["class", "id", "title", "lang", "dir", "role"]);
    builder.generic_attributes(generic);

    builder.add_tags(&["input", "section", "figure", "figcaption"]);
    builder.add_tag_attributes("a", &["target"]);
    builder.add_tag_attributes("img", &["title", "width", "height", "alt", "loading"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_url_schemes(["http", "https", "mailto", "tel"].iter().copied());

    builder
}
