//! RSS 2.0 rendering for section listings.

use time::{OffsetDateTime, format_description::well_known::Rfc2822};
use url::Url;

use crate::application::blog::SectionListing;
use crate::domain::{article::Article, path::basename};

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

/// Channel-level data that does not come from the store.
#[derive(Debug, Clone)]
pub struct FeedChannel<'a> {
    pub site_title: &'a str,
    /// Absolute URL of the blog root, ending with `/`.
    pub base: &'a Url,
    pub built_at: OffsetDateTime,
}

/// Render `listing` as an RSS 2.0 document.
///
/// Listed names without content are skipped. Binary articles keep their link
/// but carry no description.
pub fn rss_feed(channel: &FeedChannel<'_>, listing: &SectionListing) -> String {
    let mut items = String::new();
    for item in &listing.articles {
        let Some(article) = item.article.as_deref() else {
            continue;
        };
        let link = absolute(channel.base, &item.path);
        let (title, description) = match article {
            Article::Document(document) => (
                document.title().unwrap_or_else(|| item.name.clone()),
                document.html.as_str(),
            ),
            Article::Binary(_) => (item.name.clone(), ""),
        };
        items.push_str(&format!(
            "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid>{}</guid>\n      <description>{}</description>\n    </item>\n",
            xml_escape(&title),
            xml_escape(&link),
            xml_escape(&link),
            xml_escape(description),
        ));
    }

    let title = match basename(&listing.path) {
        "" => channel.site_title.to_string(),
        name => format!("{} - {name}", channel.site_title),
    };
    let built = channel
        .built_at
        .format(&Rfc2822)
        .unwrap_or_else(|_| channel.built_at.to_string());

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n    <lastBuildDate>{}</lastBuildDate>\n{}  </channel>\n</rss>\n",
        xml_escape(&title),
        xml_escape(&absolute(channel.base, &listing.path)),
        xml_escape(&title),
        built,
        items
    )
}

fn absolute(base: &Url, path: &str) -> String {
    match base.join(path) {
        Ok(url) => url.to_string(),
        Err(_) => format!("{base}{path}"),
    }
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
