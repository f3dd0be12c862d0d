//! Knowledge document model
//!
//! Documents are markdown files, optionally prefixed with a YAML front
//! matter fence. The fence is delimited by `---` lines at the very top of
//! the file; everything after it is the body, stored verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while parsing or rendering a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("front matter is not valid YAML: {0}")]
    FrontMatter(#[from] serde_yaml_ng::Error),
}

/// Structured header carried at the top of a document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_empty() && self.updated.is_none()
    }
}

/// A single knowledge document: optional front matter plus markdown body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub front_matter: FrontMatter,
    pub body: String,
}

impl Document {
    /// Document with no front matter
    pub fn from_body(body: impl Into<String>) -> Self {
        Self {
            front_matter: FrontMatter::default(),
            body: body.into(),
        }
    }

    /// Parse file content into front matter and body
    ///
    /// Content without a leading fence is all body. A fence that is present
    /// but holds only whitespace yields default front matter; a fence with
    /// unparseable YAML is an error rather than silently becoming body.
    pub fn parse(content: &str) -> Result<Self, DocumentError> {
        let (raw, body) = split_front_matter(content);
        let front_matter = match raw {
            Some(raw) if !raw.trim().is_empty() => serde_yaml_ng::from_str(raw)?,
            _ => FrontMatter::default(),
        };
        Ok(Self {
            front_matter,
            body: body.to_string(),
        })
    }

    /// Render back to file content
    ///
    /// Empty front matter produces the bare body, so documents written
    /// without a header never grow one.
    pub fn render(&self) -> Result<String, DocumentError> {
        if self.front_matter.is_empty() {
            return Ok(self.body.clone());
        }
        let yaml = serde_yaml_ng::to_string(&self.front_matter)?;
        Ok(format!("---\n{}---\n\n{}", yaml, self.body))
    }
}

/// Split content into the raw front matter fence (if any) and the body
///
/// Tolerates `\r\n` line endings around the fence. An unterminated fence is
/// not front matter at all; the content is returned untouched as body.
fn split_front_matter(data: &str) -> (Option<&str>, &str) {
    if !data.starts_with("---") {
        return (None, data);
    }
    let mut cursor = &data[3..];
    if cursor.starts_with('\r') {
        cursor = &cursor[1..];
    }
    if cursor.starts_with('\n') {
        cursor = &cursor[1..];
    } else {
        return (None, data);
    }
    if let Some((front, remainder)) = cursor.split_once("\n---") {
        let mut body = remainder;
        if body.starts_with('\r') {
            body = &body[1..];
        }
        if body.starts_with('\n') {
            body = &body[1..];
        }
        if body.starts_with('\n') {
            body = &body[1..];
        }
        return (Some(front.trim_end()), body);
    }
    (None, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_body() {
        let doc = Document::parse("# Notes\n\nJust text.\n").unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "# Notes\n\nJust text.\n");
    }

    #[test]
    fn test_parse_with_front_matter() {
        let content = "---\ntitle: Parsing tricks\ntags:\n- rust\n- parsing\n---\n\nBody text.\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.front_matter.title.as_deref(), Some("Parsing tricks"));
        assert_eq!(doc.front_matter.tags, vec!["rust", "parsing"]);
        assert_eq!(doc.body, "Body text.\n");
    }

    #[test]
    fn test_parse_tolerates_crlf() {
        let content = "---\r\ntitle: Windows\r\n---\r\nBody.\r\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.front_matter.title.as_deref(), Some("Windows"));
        assert_eq!(doc.body, "Body.\r\n");
    }

    #[test]
    fn test_unterminated_fence_is_body() {
        let content = "---\ntitle: dangling\n\nno closing fence\n";
        let doc = Document::parse(content).unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, content);
    }

    #[test]
    fn test_whitespace_fence_is_default() {
        let content = "---\n   \n---\n\nBody.\n";
        let doc = Document::parse(content).unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "Body.\n");
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let content = "---\ntitle: [unclosed\n---\n\nBody.\n";
        assert!(Document::parse(content).is_err());
    }

    #[test]
    fn test_render_round_trip() {
        let doc = Document {
            front_matter: FrontMatter {
                title: Some("Sync design".to_string()),
                tags: vec!["git".to_string(), "locking".to_string()],
                updated: Some("2026-02-11T09:30:00Z".parse().unwrap()),
            },
            body: "The lock lives under .git.\n".to_string(),
        };

        let rendered = doc.render().unwrap();
        assert!(rendered.starts_with("---\n"));

        let parsed = Document::parse(&rendered).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_render_plain_body_unchanged() {
        let doc = Document::from_body("plain\n");
        assert_eq!(doc.render().unwrap(), "plain\n");
    }

    #[test]
    fn test_setext_underline_survives_in_body() {
        let content = "Heading\n=======\n\ntext\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.body, content);
        assert_eq!(doc.render().unwrap(), content);
    }
}
