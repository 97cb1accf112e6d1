//! Request line classification
//!
//! Extracts the site section from a w3c/common log format line. A section is
//! the request path up to the slash closing its second directory segment:
//! `"GET /tags/open-source/list.html HTTP/1.1"` belongs to `/tags/open-source`,
//! `"GET /articles/item.html HTTP/1.1"` to `/articles`.

use regex::Regex;
use tracing::debug;

/// Matches the quoted request field of a GET and captures at most two
/// directory segments. Segments stop at whitespace, quotes and query strings.
pub const SECTION_PATTERN: &str = r#""GET (/[^/\s"?]+(?:/[^/\s"?]+)?)/"#;

#[derive(Debug, Clone)]
pub struct Classifier {
    pattern: Regex,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            // The pattern is a compile-time constant covered by tests
            pattern: Regex::new(SECTION_PATTERN).expect("section pattern is valid"),
        }
    }

    /// Returns the section for a request line, or `None` for lines that are
    /// not GET requests or have no request field.
    pub fn classify<'a>(&self, line: &'a str) -> Option<&'a str> {
        let section = self
            .pattern
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());

        if section.is_none() {
            debug!(line = %line, "Skipping unclassifiable line");
        }

        section
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}
