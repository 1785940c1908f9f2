//! Block extraction between a start and an end marker.
//!
//! Extraction never copies the surrounding document: an [`Extraction`]
//! borrows `prefix`, `block` and `suffix` slices from the input text, and
//! `prefix + block + suffix` is always byte-identical to that text.

use crate::document::LineIndex;
use crate::locate::{closest_line, locate, locate_line_in, Marker, MarkerMatch, MarkerRole, NearMiss};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Whether each marker's own unit (substring or line) belongs to the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoundaryPolicy {
    /// Block begins with the start marker; the end marker begins the suffix.
    #[default]
    IncludeStartExcludeEnd,
    /// Block holds only what lies strictly between the markers.
    ExcludeStartExcludeEnd,
    /// Block begins with the start marker and ends with the end marker.
    IncludeBoth,
}

impl BoundaryPolicy {
    pub fn includes_start(self) -> bool {
        matches!(
            self,
            BoundaryPolicy::IncludeStartExcludeEnd | BoundaryPolicy::IncludeBoth
        )
    }

    pub fn includes_end(self) -> bool {
        matches!(self, BoundaryPolicy::IncludeBoth)
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoundaryPolicy::IncludeStartExcludeEnd => "include-start-exclude-end",
            BoundaryPolicy::ExcludeStartExcludeEnd => "exclude-start-exclude-end",
            BoundaryPolicy::IncludeBoth => "include-both",
        };
        f.write_str(name)
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().replace('_', "-").as_str() {
            "include-start-exclude-end" => Ok(BoundaryPolicy::IncludeStartExcludeEnd),
            "exclude-start-exclude-end" => Ok(BoundaryPolicy::ExcludeStartExcludeEnd),
            "include-both" => Ok(BoundaryPolicy::IncludeBoth),
            other => Err(format!(
                "unknown boundary policy '{other}' (expected include-start-exclude-end, \
                 exclude-start-exclude-end or include-both)"
            )),
        }
    }
}

/// How marker positions are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingMode {
    /// Boundaries sit exactly at the marker's byte span.
    #[default]
    Offset,
    /// Boundaries snap to the whole line containing the marker.
    Line,
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressingMode::Offset => f.write_str("offset"),
            AddressingMode::Line => f.write_str("line"),
        }
    }
}

impl FromStr for AddressingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "offset" => Ok(AddressingMode::Offset),
            "line" => Ok(AddressingMode::Line),
            other => Err(format!(
                "unknown addressing mode '{other}' (expected offset or line)"
            )),
        }
    }
}

/// Byte span `[start, end)` within a document. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    pub start: usize,
    pub end: usize,
}

impl Region {
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Two regions overlap when they share a byte, or when both start at the
    /// same offset (the order of two insertions there would be ambiguous).
    pub fn overlaps(&self, other: &Region) -> bool {
        self.start == other.start || (self.start < other.end && other.start < self.end)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Extracted region text, detached from the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block(String);

impl Block {
    pub fn new(text: impl Into<String>) -> Self {
        Block(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Block {
    fn from(text: &str) -> Self {
        Block(text.to_string())
    }
}

impl From<String> for Block {
    fn from(text: String) -> Self {
        Block(text)
    }
}

impl AsRef<str> for Block {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document split around a resolved region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction<'a> {
    pub prefix: &'a str,
    pub block: &'a str,
    pub suffix: &'a str,
    pub region: Region,
    /// Span of the start marker's unit (the whole line in line mode)
    pub start_unit: MarkerMatch,
    /// Span of the end marker's unit (the whole line in line mode)
    pub end_unit: MarkerMatch,
}

impl Extraction<'_> {
    pub fn to_block(&self) -> Block {
        Block::from(self.block)
    }

    /// `prefix + block + suffix`; equals the source text.
    pub fn reassemble(&self) -> String {
        let mut out = String::with_capacity(self.prefix.len() + self.block.len() + self.suffix.len());
        out.push_str(self.prefix);
        out.push_str(self.block);
        out.push_str(self.suffix);
        out
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{role} marker {marker} not found{}", format_hint(.hint))]
    MarkerNotFound {
        role: MarkerRole,
        marker: String,
        hint: Option<NearMiss>,
    },

    #[error(
        "end marker {marker} only occurs at byte {end_offset}, at or before the start marker at byte {start_offset}"
    )]
    AmbiguousRegion {
        marker: String,
        start_offset: usize,
        end_offset: usize,
    },
}

impl ExtractError {
    /// Both variants mean the region could not be resolved from its markers.
    pub fn is_marker_not_found(&self) -> bool {
        matches!(
            self,
            ExtractError::MarkerNotFound { .. } | ExtractError::AmbiguousRegion { .. }
        )
    }

    fn not_found(text: &str, role: MarkerRole, marker: &Marker) -> Self {
        ExtractError::MarkerNotFound {
            role,
            marker: marker.to_string(),
            hint: closest_line(text, marker),
        }
    }
}

fn format_hint(hint: &Option<NearMiss>) -> String {
    hint.as_ref()
        .map(|hint| format!(" ({hint})"))
        .unwrap_or_default()
}

/// Split `text` around the region delimited by `start` and `end`.
pub fn extract<'a>(
    text: &'a str,
    start: &Marker,
    end: &Marker,
    policy: BoundaryPolicy,
    mode: AddressingMode,
) -> Result<Extraction<'a>, ExtractError> {
    extract_after(text, start, end, policy, mode, 0)
}

/// Like [`extract`], but the start marker is only searched at or after `after`.
///
/// The end marker is always searched after the start marker's unit, so an end
/// marker preceding the start marker is never matched.
pub fn extract_after<'a>(
    text: &'a str,
    start: &Marker,
    end: &Marker,
    policy: BoundaryPolicy,
    mode: AddressingMode,
    after: usize,
) -> Result<Extraction<'a>, ExtractError> {
    let (start_unit, end_unit) = match mode {
        AddressingMode::Offset => resolve_offsets(text, start, end, after)?,
        AddressingMode::Line => resolve_lines(text, start, end, after)?,
    };

    let block_start = if policy.includes_start() {
        start_unit.start
    } else {
        start_unit.end
    };
    let block_end = if policy.includes_end() {
        end_unit.end
    } else {
        end_unit.start
    };

    let region =
        Region::new(block_start, block_end).ok_or_else(|| ExtractError::AmbiguousRegion {
            marker: end.to_string(),
            start_offset: start_unit.start,
            end_offset: end_unit.start,
        })?;

    tracing::debug!(
        start = %start,
        end = %end,
        %region,
        %mode,
        %policy,
        "resolved region"
    );

    Ok(Extraction {
        prefix: &text[..region.start],
        block: &text[region.start..region.end],
        suffix: &text[region.end..],
        region,
        start_unit,
        end_unit,
    })
}

fn resolve_offsets(
    text: &str,
    start: &Marker,
    end: &Marker,
    after: usize,
) -> Result<(MarkerMatch, MarkerMatch), ExtractError> {
    let start_unit = locate(text, start, after)
        .ok_or_else(|| ExtractError::not_found(text, MarkerRole::Start, start))?;

    match locate(text, end, start_unit.end) {
        Some(end_unit) => Ok((start_unit, end_unit)),
        None => match locate(text, end, 0) {
            Some(earlier) => Err(ExtractError::AmbiguousRegion {
                marker: end.to_string(),
                start_offset: start_unit.start,
                end_offset: earlier.start,
            }),
            None => Err(ExtractError::not_found(text, MarkerRole::End, end)),
        },
    }
}

fn resolve_lines(
    text: &str,
    start: &Marker,
    end: &Marker,
    after: usize,
) -> Result<(MarkerMatch, MarkerMatch), ExtractError> {
    let index = LineIndex::new(text);
    let first_line = index.line_of_offset(after);

    let start_line = locate_line_in(text, &index, start, first_line)
        .ok_or_else(|| ExtractError::not_found(text, MarkerRole::Start, start))?;
    let start_unit = line_unit(&index, start_line);

    match locate_line_in(text, &index, end, start_line + 1) {
        Some(end_line) => Ok((start_unit, line_unit(&index, end_line))),
        None => match locate_line_in(text, &index, end, 0) {
            Some(earlier) => Err(ExtractError::AmbiguousRegion {
                marker: end.to_string(),
                start_offset: start_unit.start,
                end_offset: line_unit(&index, earlier).start,
            }),
            None => Err(ExtractError::not_found(text, MarkerRole::End, end)),
        },
    }
}

fn line_unit(index: &LineIndex, line: usize) -> MarkerMatch {
    // Lines returned by the locator are always < line_count
    let start = index.line_start(line).unwrap_or_default();
    let end = index.line_end(line).unwrap_or(start);
    MarkerMatch { start, end }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Marker {
        Marker::literal(s)
    }

    #[test]
    fn test_include_start_exclude_end() {
        let text = "A<!--S-->BBB<!--E-->C";
        let ex = extract(
            text,
            &lit("<!--S-->"),
            &lit("<!--E-->"),
            BoundaryPolicy::IncludeStartExcludeEnd,
            AddressingMode::Offset,
        )
        .unwrap();
        assert_eq!(ex.prefix, "A");
        assert_eq!(ex.block, "<!--S-->BBB");
        assert_eq!(ex.suffix, "<!--E-->C");
        assert_eq!(ex.reassemble(), text);
    }

    #[test]
    fn test_exclude_both() {
        let text = "A<!--S-->BBB<!--E-->C";
        let ex = extract(
            text,
            &lit("<!--S-->"),
            &lit("<!--E-->"),
            BoundaryPolicy::ExcludeStartExcludeEnd,
            AddressingMode::Offset,
        )
        .unwrap();
        assert_eq!(ex.prefix, "A<!--S-->");
        assert_eq!(ex.block, "BBB");
        assert_eq!(ex.suffix, "<!--E-->C");
    }

    #[test]
    fn test_include_both() {
        let text = "A<!--S-->BBB<!--E-->C";
        let ex = extract(
            text,
            &lit("<!--S-->"),
            &lit("<!--E-->"),
            BoundaryPolicy::IncludeBoth,
            AddressingMode::Offset,
        )
        .unwrap();
        assert_eq!(ex.block, "<!--S-->BBB<!--E-->");
        assert_eq!(ex.suffix, "C");
    }

    #[test]
    fn test_adjacent_markers_give_empty_region() {
        let text = "x<a></a>y";
        let ex = extract(
            text,
            &lit("<a>"),
            &lit("</a>"),
            BoundaryPolicy::ExcludeStartExcludeEnd,
            AddressingMode::Offset,
        )
        .unwrap();
        assert!(ex.region.is_empty());
        assert_eq!(ex.block, "");
    }

    #[test]
    fn test_missing_end_marker() {
        let err = extract(
            "A<!--S-->BBB",
            &lit("<!--S-->"),
            &lit("<!--E-->"),
            BoundaryPolicy::default(),
            AddressingMode::Offset,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::MarkerNotFound {
                role: MarkerRole::End,
                ..
            }
        ));
        assert!(err.is_marker_not_found());
    }

    #[test]
    fn test_missing_start_marker_with_hint() {
        let text = "<main>\n<!-- Distributors Map -->\n</main>\n";
        let err = extract(
            text,
            &lit("<!-- Distributor Map -->"),
            &lit("</main>"),
            BoundaryPolicy::default(),
            AddressingMode::Offset,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("start marker"));
        assert!(message.contains("closest line 2"));
    }

    #[test]
    fn test_end_before_start_is_ambiguous() {
        let text = "<!--E--> then <!--S--> body";
        let err = extract(
            text,
            &lit("<!--S-->"),
            &lit("<!--E-->"),
            BoundaryPolicy::default(),
            AddressingMode::Offset,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ExtractError::AmbiguousRegion {
                marker: "\"<!--E-->\"".to_string(),
                start_offset: 14,
                end_offset: 0,
            }
        );
        assert!(err.is_marker_not_found());
    }

    #[test]
    fn test_extract_after_offset() {
        let text = "<s>one</s><s>two</s>";
        let ex = extract_after(
            text,
            &lit("<s>"),
            &lit("</s>"),
            BoundaryPolicy::ExcludeStartExcludeEnd,
            AddressingMode::Offset,
            5,
        )
        .unwrap();
        assert_eq!(ex.block, "two");
    }

    #[test]
    fn test_line_mode_include_start_exclude_end() {
        let text = "<script>\n  if (about.image) {\n    old();\n  }\n  // Reveal about section\n  reveal();\n";
        let ex = extract(
            text,
            &lit("if (about.image) {"),
            &lit("// Reveal about section"),
            BoundaryPolicy::IncludeStartExcludeEnd,
            AddressingMode::Line,
        )
        .unwrap();
        assert_eq!(ex.prefix, "<script>\n");
        assert_eq!(ex.block, "  if (about.image) {\n    old();\n  }\n");
        assert_eq!(ex.suffix, "  // Reveal about section\n  reveal();\n");
        assert_eq!(ex.reassemble(), text);
    }

    #[test]
    fn test_line_mode_exclude_start_include_end_lines() {
        let text = "a\nSTART\nb\nc\nEND\nd";
        let inner = extract(
            text,
            &lit("START"),
            &lit("END"),
            BoundaryPolicy::ExcludeStartExcludeEnd,
            AddressingMode::Line,
        )
        .unwrap();
        assert_eq!(inner.block, "b\nc\n");

        let both = extract(
            text,
            &lit("START"),
            &lit("END"),
            BoundaryPolicy::IncludeBoth,
            AddressingMode::Line,
        )
        .unwrap();
        assert_eq!(both.block, "START\nb\nc\nEND\n");
        assert_eq!(both.suffix, "d");
    }

    #[test]
    fn test_line_mode_end_on_start_line_is_ambiguous() {
        let text = "START END\nmore\n";
        let err = extract(
            text,
            &lit("START"),
            &lit("END"),
            BoundaryPolicy::default(),
            AddressingMode::Line,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::AmbiguousRegion { .. }));
    }

    #[test]
    fn test_line_mode_preserves_crlf() {
        let text = "a\r\nSTART\r\nbody\r\nEND\r\n";
        let ex = extract(
            text,
            &lit("START"),
            &lit("END"),
            BoundaryPolicy::default(),
            AddressingMode::Line,
        )
        .unwrap();
        assert_eq!(ex.block, "START\r\nbody\r\n");
        assert_eq!(ex.reassemble(), text);
    }

    #[test]
    fn test_pattern_markers() {
        let text = "<script>\nconst distributors = { a: 1 };\n</script>";
        let ex = extract(
            text,
            &Marker::pattern(r"const \w+ = \{").unwrap(),
            &Marker::pattern(r"</script>").unwrap(),
            BoundaryPolicy::default(),
            AddressingMode::Offset,
        )
        .unwrap();
        assert_eq!(ex.block, "const distributors = { a: 1 };\n");
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "include_both".parse::<BoundaryPolicy>().unwrap(),
            BoundaryPolicy::IncludeBoth
        );
        assert_eq!(
            BoundaryPolicy::ExcludeStartExcludeEnd
                .to_string()
                .parse::<BoundaryPolicy>()
                .unwrap(),
            BoundaryPolicy::ExcludeStartExcludeEnd
        );
        assert!("sideways".parse::<BoundaryPolicy>().is_err());
        assert_eq!("line".parse::<AddressingMode>().unwrap(), AddressingMode::Line);
    }

    #[test]
    fn test_region_overlap() {
        let a = Region::new(0, 5).unwrap();
        let b = Region::new(5, 8).unwrap();
        let c = Region::new(4, 6).unwrap();
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(Region::new(3, 3).unwrap().overlaps(&Region::new(3, 7).unwrap()));
        assert!(Region::new(4, 2).is_none());
    }
}
