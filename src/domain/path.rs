//! Classification of request paths into sections and articles.
//!
//! A path that is empty or ends with `/` names a section. A path whose final
//! segment is the literal `rss` names the feed of its parent section.
//! Everything else names a single article.

pub const SECTION_DELIMITER: char = '/';
pub const FEED_SEGMENT: &str = "rss";

/// What a request path points at before any store lookup happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestTarget {
    /// A section listing, or its RSS feed when `feed` is set.
    Section { path: String, feed: bool },
    /// A single article.
    Article { path: String },
}

impl RequestTarget {
    pub fn classify(path: &str) -> Self {
        if path.is_empty() || path.ends_with(SECTION_DELIMITER) {
            return Self::Section {
                path: path.to_string(),
                feed: false,
            };
        }

        let (parent, last) = match path.rfind(SECTION_DELIMITER) {
            Some(idx) => (&path[..=idx], &path[idx + 1..]),
            None => ("", path),
        };

        if last == FEED_SEGMENT {
            Self::Section {
                path: parent.to_string(),
                feed: true,
            }
        } else {
            Self::Article {
                path: path.to_string(),
            }
        }
    }
}

/// Join a section path with one of its member names.
pub fn join(section: &str, name: &str) -> String {
    if section.is_empty() || section.ends_with(SECTION_DELIMITER) {
        format!("{section}{name}")
    } else {
        format!("{section}{SECTION_DELIMITER}{name}")
    }
}

/// Final path segment, ignoring a trailing delimiter.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SECTION_DELIMITER);
    match trimmed.rfind(SECTION_DELIMITER) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Whether the final segment carries a file extension.
///
/// Leading dots never start an extension (`.profile` has none) while a
/// trailing dot does (`notes.` has one).
pub fn has_extension(path: &str) -> bool {
    let name = match path.rfind(SECTION_DELIMITER) {
        Some(idx) => &path[idx + 1..],
        None => path,
    };
    name.trim_start_matches('.').contains('.')
}
