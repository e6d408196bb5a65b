//! Comment submissions, their validation and the provenance recorded with them.

use serde::Deserialize;

/// Hidden form fields that humans never fill in.
pub const SPAM_TRAP_FIELDS: &[&str] = &["homepage"];

const UNKNOWN_SOURCE: &str = "Unknown source";

/// Raw form payload as posted by the browser.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommentInput {
    pub name: String,
    pub content: String,
    pub homepage: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
    pub spam_trap: bool,
}

/// A validated comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub name: String,
    pub content: String,
}

/// Form state carried into the article template.
#[derive(Debug, Clone, Default)]
pub struct CommentForm {
    pub input: CommentInput,
    pub errors: Vec<FieldError>,
    submitted: bool,
}

impl CommentForm {
    /// An untouched form for GET requests.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Validate a submitted payload.
    pub fn submitted(input: CommentInput) -> Self {
        let mut errors = Vec::new();

        if input.name.trim().is_empty() {
            errors.push(FieldError {
                field: "name",
                message: "This field is required.",
                spam_trap: false,
            });
        }
        if input.content.trim().is_empty() {
            errors.push(FieldError {
                field: "content",
                message: "This field is required.",
                spam_trap: false,
            });
        }
        for &field in SPAM_TRAP_FIELDS {
            let value = match field {
                "homepage" => input.homepage.as_str(),
                _ => "",
            };
            if !value.trim().is_empty() {
                errors.push(FieldError {
                    field,
                    message: "This field must be left empty.",
                    spam_trap: true,
                });
            }
        }

        Self {
            input,
            errors,
            submitted: true,
        }
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn is_valid(&self) -> bool {
        self.submitted && self.errors.is_empty()
    }

    /// Whether any spam-trap field was populated.
    pub fn spam_detected(&self) -> bool {
        self.errors.iter().any(|error| error.spam_trap)
    }

    pub fn error_for(&self, field: &str) -> Option<&'static str> {
        self.errors
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
    }

    /// The comment to store, only when the submission passed validation.
    pub fn comment(&self) -> Option<Comment> {
        self.is_valid().then(|| Comment {
            name: self.input.name.trim().to_string(),
            content: self.input.content.trim().to_string(),
        })
    }
}

/// Request metadata stored in the commit message of a comment write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provenance {
    pub referer: Option<String>,
    pub remote_addr: Option<String>,
    pub language: Option<String>,
    pub user_agent: Option<String>,
}

impl Provenance {
    pub fn commit_message(&self) -> String {
        let remote = self.remote_addr.as_deref().unwrap_or(UNKNOWN_SOURCE);
        format!(
            "{remote}\n\nReferer: {}\nRemote addr: {remote}\nLanguage: {}\nUser Agent: {}\n",
            self.referer.as_deref().unwrap_or(""),
            self.language.as_deref().unwrap_or(""),
            self.user_agent.as_deref().unwrap_or(""),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, content: &str, homepage: &str) -> CommentInput {
        CommentInput {
            name: name.to_string(),
            content: content.to_string(),
            homepage: homepage.to_string(),
        }
    }

    #[test]
    fn blank_form_is_neither_valid_nor_spam() {
        let form = CommentForm::blank();
        assert!(!form.is_submitted());
        assert!(!form.is_valid());
        assert!(!form.spam_detected());
        assert!(form.comment().is_none());
    }

    #[test]
    fn required_fields_are_reported() {
        let form = CommentForm::submitted(input("  ", "", ""));
        assert!(!form.is_valid());
        assert_eq!(form.error_for("name"), Some("This field is required."));
        assert_eq!(form.error_for("content"), Some("This field is required."));
        assert!(!form.spam_detected());
    }

    #[test]
    fn populated_trap_blocks_otherwise_valid_submission() {
        let form = CommentForm::submitted(input("Ann", "Nice post", "http://spam.example"));
        assert!(form.spam_detected());
        assert!(!form.is_valid());
        assert!(form.comment().is_none());
    }

    #[test]
    fn valid_submission_yields_trimmed_comment() {
        let form = CommentForm::submitted(input(" Ann ", " Nice post\n", ""));
        assert_eq!(
            form.comment(),
            Some(Comment {
                name: "Ann".to_string(),
                content: "Nice post".to_string(),
            })
        );
    }

    #[test]
    fn commit_message_carries_request_metadata() {
        let provenance = Provenance {
            referer: Some("http://example.com/blog/a".to_string()),
            remote_addr: Some("10.0.0.1:5555".to_string()),
            language: Some("en".to_string()),
            user_agent: Some("curl/8".to_string()),
        };

        let message = provenance.commit_message();
        assert!(message.starts_with("10.0.0.1:5555\n\n"));
        assert!(message.contains("Referer: http://example.com/blog/a\n"));
        assert!(message.contains("Remote addr: 10.0.0.1:5555\n"));
        assert!(message.contains("Language: en\n"));
        assert!(message.contains("User Agent: curl/8\n"));
    }

    #[test]
    fn commit_message_defaults_unknown_source() {
        let message = Provenance::default().commit_message();
        assert!(message.starts_with("Unknown source\n"));
    }
}
