//! Marker location by byte offset or by line.
//!
//! Markers are fragile: a document edited by hand (or by a previous run)
//! silently stops containing them. Every lookup therefore returns an
//! `Option` so "not found" is an ordinary, checkable outcome, and
//! [`closest_line`] can explain what the document contains instead.

use crate::document::{Document, LineIndex};
use regex::{Regex, RegexBuilder};
use std::fmt;
use thiserror::Error;

/// Minimum normalized similarity for a line to be reported as a near miss.
const NEAR_MISS_THRESHOLD: f64 = 0.6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    #[error("invalid marker pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },
}

/// Which end of a region a marker delimits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerRole {
    Start,
    End,
}

impl fmt::Display for MarkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerRole::Start => write!(f, "start"),
            MarkerRole::End => write!(f, "end"),
        }
    }
}

/// A literal substring or a regex used to find a position in a document.
#[derive(Debug, Clone)]
pub enum Marker {
    /// Exact, case-sensitive substring
    Literal(String),
    /// Regex compiled in multi-line mode (`^`/`$` match at line boundaries)
    Pattern(Regex),
}

impl Marker {
    pub fn literal(text: impl Into<String>) -> Self {
        Marker::Literal(text.into())
    }

    /// Compile a pattern marker. `.` does not cross newlines.
    pub fn pattern(pattern: &str) -> Result<Self, LocateError> {
        Self::pattern_with(pattern, false)
    }

    /// Compile a pattern marker, optionally letting `.` match `\n`.
    pub fn pattern_with(pattern: &str, dot_all: bool) -> Result<Self, LocateError> {
        RegexBuilder::new(pattern)
            .multi_line(true)
            .dot_matches_new_line(dot_all)
            .build()
            .map(Marker::Pattern)
            .map_err(|e| LocateError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Marker::Literal(text) => text,
            Marker::Pattern(regex) => regex.as_str(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Marker::Literal(_))
    }

    fn find_at(&self, text: &str, after: usize) -> Option<MarkerMatch> {
        match self {
            Marker::Literal(needle) => text[after..].find(needle.as_str()).map(|idx| {
                let start = after + idx;
                MarkerMatch {
                    start,
                    end: start + needle.len(),
                }
            }),
            Marker::Pattern(regex) => regex.find_at(text, after).map(|m| MarkerMatch {
                start: m.start(),
                end: m.end(),
            }),
        }
    }

    fn matches_line(&self, line: &str) -> bool {
        match self {
            Marker::Literal(needle) => line.contains(needle.as_str()),
            Marker::Pattern(regex) => regex.is_match(line),
        }
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Marker::Literal(a), Marker::Literal(b)) => a == b,
            (Marker::Pattern(a), Marker::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for Marker {}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Literal(text) => write!(f, "{text:?}"),
            Marker::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Byte span `[start, end)` of a marker occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerMatch {
    pub start: usize,
    pub end: usize,
}

/// Find the first occurrence of `marker` starting at or after byte `after`.
///
/// An `after` inside a multi-byte character is moved forward to the next
/// character boundary. Returns `None` when `after` lies past the end.
pub fn locate(text: &str, marker: &Marker, after: usize) -> Option<MarkerMatch> {
    if after > text.len() {
        return None;
    }
    let mut after = after;
    while !text.is_char_boundary(after) {
        after += 1;
    }
    marker.find_at(text, after)
}

/// Find the first line at or below `from_line` whose content contains `marker`.
pub fn locate_line(document: &Document, marker: &Marker, from_line: usize) -> Option<usize> {
    locate_line_in(document.text(), document.line_index(), marker, from_line)
}

pub(crate) fn locate_line_in(
    text: &str,
    index: &LineIndex,
    marker: &Marker,
    from_line: usize,
) -> Option<usize> {
    (from_line..index.line_count()).find(|&line| {
        index
            .line(text, line)
            .is_some_and(|content| marker.matches_line(content))
    })
}

/// A line that resembles a marker that could not be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NearMiss {
    /// Zero-based line index
    pub line: usize,
    /// Trimmed line content
    pub text: String,
}

impl fmt::Display for NearMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closest line {}: {:?}", self.line + 1, self.text)
    }
}

/// Find the line most similar to a literal marker.
///
/// Pattern markers have no meaningful edit distance and always yield `None`.
pub fn closest_line(text: &str, marker: &Marker) -> Option<NearMiss> {
    let Marker::Literal(needle) = marker else {
        return None;
    };
    let needle = needle.trim();
    if needle.is_empty() {
        return None;
    }

    let mut best: Option<(f64, usize, &str)> = None;
    for (idx, line) in text.lines().enumerate() {
        let candidate = line.trim();
        if candidate.is_empty() {
            continue;
        }
        let score = strsim::normalized_levenshtein(needle, candidate);
        if score >= NEAR_MISS_THRESHOLD && best.map_or(true, |(top, _, _)| score > top) {
            best = Some((score, idx, candidate));
        }
    }

    best.map(|(_, line, text)| NearMiss {
        line,
        text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_literal() {
        let text = "A<!--S-->BBB<!--E-->C";
        let m = locate(text, &Marker::literal("<!--S-->"), 0).unwrap();
        assert_eq!((m.start, m.end), (1, 9));
    }

    #[test]
    fn test_locate_is_case_sensitive() {
        assert!(locate("<DIV>", &Marker::literal("<div>"), 0).is_none());
    }

    #[test]
    fn test_locate_after_skips_earlier_occurrences() {
        let text = "x--x--x";
        let marker = Marker::literal("x");
        assert_eq!(locate(text, &marker, 1).unwrap().start, 3);
        assert_eq!(locate(text, &marker, 4).unwrap().start, 6);
        assert!(locate(text, &marker, 7).is_none());
        assert!(locate(text, &marker, 50).is_none());
    }

    #[test]
    fn test_locate_after_inside_multibyte_char() {
        let text = "zażółć <b>";
        // Offset 3 falls inside 'ż'
        let m = locate(text, &Marker::literal("<b>"), 3).unwrap();
        assert_eq!(&text[m.start..m.end], "<b>");
    }

    #[test]
    fn test_locate_pattern_multiline_anchor() {
        let text = "intro\n<script>\nbody\n</script>\n";
        let marker = Marker::pattern(r"^<script>$").unwrap();
        let m = locate(text, &marker, 0).unwrap();
        assert_eq!(m.start, 6);
    }

    #[test]
    fn test_pattern_dot_all_flag() {
        let text = "<h1>\nTitle\n</h1>";
        let plain = Marker::pattern(r"<h1>.*</h1>").unwrap();
        let dot_all = Marker::pattern_with(r"<h1>.*</h1>", true).unwrap();
        assert!(locate(text, &plain, 0).is_none());
        assert_eq!(locate(text, &dot_all, 0).unwrap().end, text.len());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Marker::pattern("(unclosed").unwrap_err();
        assert!(matches!(err, LocateError::InvalidPattern { .. }));
    }

    #[test]
    fn test_locate_line_contains() {
        let doc = Document::new("<body>\n  if (about.image) {\n  }\n  // Reveal about section\n");
        let start = locate_line(&doc, &Marker::literal("if (about.image) {"), 0);
        assert_eq!(start, Some(1));
        let end = locate_line(&doc, &Marker::literal("// Reveal about section"), 2);
        assert_eq!(end, Some(3));
        assert_eq!(
            locate_line(&doc, &Marker::literal("if (about.image) {"), 2),
            None
        );
    }

    #[test]
    fn test_locate_line_pattern() {
        let doc = Document::new("a\nconst distributors = {\nb");
        let marker = Marker::pattern(r"const \w+ = \{").unwrap();
        assert_eq!(locate_line(&doc, &marker, 0), Some(1));
    }

    #[test]
    fn test_closest_line_reports_near_miss() {
        let text = "<main>\n  <!-- Distributors Map -->\n</main>";
        let hint = closest_line(text, &Marker::literal("<!-- Distributor Map -->")).unwrap();
        assert_eq!(hint.line, 1);
        assert_eq!(hint.text, "<!-- Distributors Map -->");
        assert!(hint.to_string().contains("closest line 2"));
    }

    #[test]
    fn test_closest_line_ignores_unrelated_text() {
        let text = "<html>\n<body>\n</body>\n</html>";
        assert!(closest_line(text, &Marker::literal("const distributors = {")).is_none());
    }

    #[test]
    fn test_marker_display() {
        assert_eq!(Marker::literal("<!--S-->").to_string(), "\"<!--S-->\"");
        assert_eq!(Marker::pattern("a+").unwrap().to_string(), "/a+/");
    }
}
