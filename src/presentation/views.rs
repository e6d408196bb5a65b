use crate::application::{
    blog::{ListedArticle, SectionListing},
    error::{ErrorReport, HttpError},
};
use crate::domain::{
    article::{Article, Document},
    comment::CommentForm,
    path::{FEED_SEGMENT, SECTION_DELIMITER, basename},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use url::form_urlencoded::byte_serialize;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let view = LayoutContext::new(chrome, NotFoundView::default());
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// Percent-encode every segment of a store path, keeping the delimiters.
pub fn encode_path(path: &str) -> String {
    path.split(SECTION_DELIMITER)
        .map(|segment| {
            byte_serialize(segment.as_bytes())
                .collect::<String>()
                .replace('+', "%20")
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuLink {
    pub label: String,
    pub href: String,
}

/// One-shot notice shown at the top of the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashView {
    /// `message` or `error`.
    pub category: String,
    pub message: String,
}

/// Page furniture shared by every HTML view.
#[derive(Debug, Clone)]
pub struct LayoutChrome {
    pub site_title: String,
    /// Absolute path of the blog root, always ending with `/`.
    pub root_href: String,
    pub menu: Vec<MenuLink>,
    pub flashes: Vec<FlashView>,
}

impl LayoutChrome {
    /// Build the chrome from the mount path and the top-level section names.
    pub fn new(site_title: &str, mount_path: &str, menu: &[String]) -> Self {
        let root_href = format!("{mount_path}/");
        let menu = menu
            .iter()
            .map(|section| MenuLink {
                label: basename(section).to_string(),
                href: format!("{root_href}{}", encode_path(section)),
            })
            .collect();
        Self {
            site_title: site_title.to_string(),
            root_href,
            menu,
            flashes: Vec::new(),
        }
    }

    pub fn with_flashes(self, flashes: Vec<FlashView>) -> Self {
        Self { flashes, ..self }
    }

    pub fn href(&self, path: &str) -> String {
        format!("{}{}", self.root_href, encode_path(path))
    }
}

#[derive(Debug, Clone)]
pub struct LayoutContext<T> {
    pub site_title: String,
    pub root_href: String,
    pub menu: Vec<MenuLink>,
    pub flashes: Vec<FlashView>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            site_title: chrome.site_title,
            root_href: chrome.root_href,
            menu: chrome.menu,
            flashes: chrome.flashes,
            content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticleCard {
    pub title: String,
    pub href: String,
    /// Rendered body; `None` for binaries and names without content.
    pub html: Option<String>,
}

impl ArticleCard {
    fn from_listed(chrome: &LayoutChrome, item: &ListedArticle) -> Self {
        let document = item.article.as_deref().and_then(Article::as_document);
        Self {
            title: document_title(document, &item.name),
            href: chrome.href(&item.path),
            html: document.map(|document| document.html.clone()),
        }
    }
}

pub struct SectionView {
    pub title: String,
    pub sections: Vec<MenuLink>,
    pub articles: Vec<ArticleCard>,
    pub feed_href: String,
}

impl SectionView {
    pub fn from_listing(chrome: &LayoutChrome, listing: &SectionListing) -> Self {
        let title = match basename(&listing.path) {
            "" => chrome.site_title.clone(),
            name => name.to_string(),
        };
        let sections = listing
            .sections
            .iter()
            .map(|name| MenuLink {
                label: basename(name).to_string(),
                href: chrome.href(&format!("{}{name}", listing.path)),
            })
            .collect();
        let articles = listing
            .articles
            .iter()
            .map(|item| ArticleCard::from_listed(chrome, item))
            .collect();

        Self {
            title,
            sections,
            articles,
            feed_href: chrome.href(&format!("{}{FEED_SEGMENT}", listing.path)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub value: String,
}

/// Comment form state for the article template.
#[derive(Debug, Clone, Default)]
pub struct CommentFormView {
    pub action: String,
    pub name: String,
    pub content: String,
    pub name_error: Option<&'static str>,
    pub content_error: Option<&'static str>,
}

pub struct ArticleView {
    pub title: String,
    pub html: String,
    pub metadata: Vec<MetadataEntry>,
    /// Present when comments are enabled and the spam trap stayed empty.
    pub form: Option<CommentFormView>,
    /// Shown in place of the form after a spam-trap hit.
    pub spam_message: Option<String>,
}

impl ArticleView {
    pub fn new(path: &str, document: &Document) -> Self {
        let metadata = document
            .metadata
            .iter()
            .filter(|(key, _)| key.as_str() != "title")
            .map(|(key, values)| MetadataEntry {
                key: key.clone(),
                value: values.join(" "),
            })
            .collect();

        Self {
            title: document_title(Some(document), basename(path)),
            html: document.html.clone(),
            metadata,
            form: None,
            spam_message: None,
        }
    }

    /// Attach the comment form, or the spam message when the trap fired.
    pub fn with_comments(self, action: String, form: &CommentForm, spam_message: &str) -> Self {
        if form.spam_detected() {
            return Self {
                spam_message: Some(spam_message.to_string()),
                ..self
            };
        }

        let view = CommentFormView {
            action,
            name: form.input.name.clone(),
            content: form.input.content.clone(),
            name_error: form.error_for("name"),
            content_error: form.error_for("content"),
        };
        Self {
            form: Some(view),
            ..self
        }
    }
}

pub struct NotFoundView {
    pub title: String,
    pub message: String,
}

impl Default for NotFoundView {
    fn default() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "Nothing is published at this address.".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "section.html")]
pub struct SectionTemplate {
    pub view: LayoutContext<SectionView>,
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub view: LayoutContext<ArticleView>,
}

#[derive(Template)]
#[template(path = "not_found.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}

fn document_title(document: Option<&Document>, fallback: &str) -> String {
    document
        .and_then(Document::title)
        .unwrap_or_else(|| fallback.to_string())
}
