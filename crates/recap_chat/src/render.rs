//! Rendering of ingestion results into assistant messages.
//!
//! Layout, in order:
//!
//! ```text
//! ## Summary
//! <summary>
//!
//! ## Key Points
//! 1. <first point>
//! 2. <second point>
//! ```
//!
//! Either section is emitted only when its field is present and non-empty.
//! With neither, a free-form `response` is used verbatim. With nothing at
//! all the message is [`NO_CONTENT`]. Trailing whitespace is trimmed.

use std::fmt::Write;

use crate::types::IngestResult;

pub const SUMMARY_HEADER: &str = "## Summary";
pub const KEY_POINTS_HEADER: &str = "## Key Points";
pub const NO_CONTENT: &str = "No content available";

/// Render a structured result as markdown text.
pub fn render_result(result: &IngestResult) -> String {
    let mut out = String::new();

    let summary = result.summary.as_deref().filter(|s| !s.is_empty());
    let key_points = result.key_points.as_deref().filter(|points| !points.is_empty());

    if let Some(summary) = summary {
        let _ = write!(out, "{}\n{}\n\n", SUMMARY_HEADER, summary);
    }

    if let Some(points) = key_points {
        let _ = writeln!(out, "{}", KEY_POINTS_HEADER);
        for (index, point) in points.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", index + 1, point);
        }
    }

    if summary.is_none() && key_points.is_none() {
        if let Some(response) = &result.response {
            out.push_str(response);
        }
    }

    let rendered = out.trim_end();
    if rendered.is_empty() {
        NO_CONTENT.to_string()
    } else {
        rendered.to_string()
    }
}

impl IngestResult {
    /// See [`render_result`].
    pub fn render(&self) -> String {
        render_result(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_and_key_points() {
        let result = IngestResult::summary("S", vec!["a".to_string(), "b".to_string()]);
        assert_eq!(result.render(), "## Summary\nS\n\n## Key Points\n1. a\n2. b");
    }

    #[test]
    fn test_summary_only() {
        let result = IngestResult {
            summary: Some("Just the gist".to_string()),
            ..Default::default()
        };
        assert_eq!(result.render(), "## Summary\nJust the gist");
    }

    #[test]
    fn test_key_points_only() {
        let result = IngestResult {
            key_points: Some(vec!["one".to_string(), "two".to_string(), "three".to_string()]),
            ..Default::default()
        };
        assert_eq!(result.render(), "## Key Points\n1. one\n2. two\n3. three");
    }

    #[test]
    fn test_response_used_when_no_structured_fields() {
        assert_eq!(IngestResult::response("hi").render(), "hi");
    }

    #[test]
    fn test_response_ignored_when_summary_present() {
        let result = IngestResult {
            summary: Some("S".to_string()),
            response: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(result.render(), "## Summary\nS");
    }

    #[test]
    fn test_empty_fields_fall_through() {
        let result = IngestResult {
            summary: Some(String::new()),
            key_points: Some(Vec::new()),
            response: Some("fallback  \n".to_string()),
        };
        assert_eq!(result.render(), "fallback");
    }

    #[test]
    fn test_blank_summary_still_gets_a_section() {
        let result = IngestResult {
            summary: Some("  ".to_string()),
            response: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(result.render(), "## Summary");
    }

    #[test]
    fn test_no_content_placeholder() {
        assert_eq!(IngestResult::default().render(), NO_CONTENT);
        assert_eq!(IngestResult::response("   ").render(), NO_CONTENT);
    }
}
