use std::{cell::RefCell, rc::Rc};

use comrak::{Arena, Options, format_html, parse_document};
use lol_html::{RewriteStrSettings, doc_text, rewrite_str};

use super::HandlerError;

/// Render Markdown to HTML. Raw HTML in the source is omitted unless the
/// options allow it.
pub(crate) fn render_markdown(
    markdown: &str,
    options: &Options<'static>,
) -> Result<String, HandlerError> {
    let arena = Arena::new();
    let root = parse_document(&arena, markdown, options);
    let mut html = String::new();
    format_html(root, options, &mut html).map_err(|err| HandlerError::Markup {
        message: err.to_string(),
    })?;
    Ok(html)
}

/// Keep only the text nodes of an HTML fragment. Entities are left encoded.
pub(crate) fn strip_markup(html: &str) -> Result<String, HandlerError> {
    let collected = Rc::new(RefCell::new(String::new()));

    rewrite_str(
        html,
        RewriteStrSettings {
            document_content_handlers: vec![doc_text!({
                let collected = Rc::clone(&collected);
                move |chunk| {
                    collected.borrow_mut().push_str(chunk.as_str());
                    Ok(())
                }
            })],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| HandlerError::Markup {
        message: err.to_string(),
    })?;

    let text = collected.borrow().clone();
    Ok(text)
}

/// Markdown → HTML → text, so the result can never carry markup.
pub(crate) fn markdown_to_text(markdown: &str) -> Result<String, HandlerError> {
    let html = render_markdown(markdown, &Options::default())?;
    strip_markup(&html)
}

pub(crate) fn escape_html(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_markup_keeps_text_only() {
        let text = strip_markup("<p>Hello <b>world</b></p><br/>").unwrap();
        assert_eq!(text, "Hello world");
    }

    #[test]
    fn markdown_to_text_drops_raw_html() {
        let text = markdown_to_text("**bold** <img src=x onerror=alert(1)>").unwrap();
        assert!(text.contains("bold"));
        assert!(!text.contains("<img"));
        assert!(!text.contains("<strong>"));
    }

    #[test]
    fn escaped_markup_stays_encoded() {
        let text = markdown_to_text("`<script>`").unwrap();
        assert!(!text.contains("<script>"));
        assert!(text.contains("&lt;script&gt;"));
    }

    #[test]
    fn escape_html_covers_attribute_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
