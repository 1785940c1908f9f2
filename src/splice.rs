use crate::extract::Region;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// A verified replacement of one region of a document.
///
/// Every destination edit compiles down to a `Splice`: the region to replace,
/// the new text, and what the region is expected to contain right now.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "Splice does nothing until applied"]
pub struct Splice {
    pub region: Region,
    pub new_text: String,
    pub expected_before: Verification,
}

/// What a region must contain before it may be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (cheaper to carry for large regions)
    Hash(u64),
}

impl Verification {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Verification::ExactMatch(expected) => text == expected,
            Verification::Hash(expected) => xxh3_64(text.as_bytes()) == *expected,
        }
    }

    /// Exact match for short text, hash above 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            Verification::Hash(xxh3_64(text.as_bytes()))
        } else {
            Verification::ExactMatch(text.to_string())
        }
    }

    pub fn hash(&self) -> u64 {
        match self {
            Verification::Hash(h) => *h,
            Verification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("invalid region {region} in document of length {len}")]
    InvalidRange { region: Region, len: usize },

    #[error("region {region} does not fall on character boundaries")]
    NotCharBoundary { region: Region },

    #[error("region {region} no longer holds the expected text (found {found:?})")]
    BeforeTextMismatch { region: Region, found: String },

    #[error("regions {first} and {second} overlap")]
    Overlap { first: Region, second: Region },
}

impl Splice {
    /// Create a splice that expects `expected_before` at `region`.
    pub fn new(region: Region, new_text: impl Into<String>, expected_before: &str) -> Self {
        Self {
            region,
            new_text: new_text.into(),
            expected_before: Verification::from_text(expected_before),
        }
    }

    pub fn with_verification(
        region: Region,
        new_text: impl Into<String>,
        verification: Verification,
    ) -> Self {
        Self {
            region,
            new_text: new_text.into(),
            expected_before: verification,
        }
    }

    /// Check the splice against `text`, returning the current region text.
    fn validate<'a>(&self, text: &'a str) -> Result<&'a str, SpliceError> {
        let region = self.region;
        let current = region_text(text, region)?;

        // Already holds the new text
        if current == self.new_text {
            return Ok(current);
        }

        if !self.expected_before.matches(current) {
            return Err(SpliceError::BeforeTextMismatch {
                region,
                found: current.to_string(),
            });
        }

        Ok(current)
    }

    /// True when the region already holds the new text.
    pub fn is_noop(&self, text: &str) -> bool {
        text.get(self.region.start..self.region.end) == Some(self.new_text.as_str())
    }
}

/// Text of `region` in `text`, once the region is in range and on char boundaries.
fn region_text(text: &str, region: Region) -> Result<&str, SpliceError> {
    if region.start > region.end || region.end > text.len() {
        return Err(SpliceError::InvalidRange {
            region,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(region.start) || !text.is_char_boundary(region.end) {
        return Err(SpliceError::NotCharBoundary { region });
    }
    Ok(&text[region.start..region.end])
}

/// `destination[..region.start] + new_block + destination[region.end..]`.
pub fn splice(destination: &str, region: Region, new_block: &str) -> Result<String, SpliceError> {
    let current = region_text(destination, region)?;
    apply_splices(destination, vec![Splice::new(region, new_block, current)])
}

/// Apply non-overlapping splices to `text` in one pass.
///
/// All splices are validated against the original text first. They are then
/// applied from the last region to the first, so offsets computed against the
/// original text stay valid throughout.
pub fn apply_splices(text: &str, mut splices: Vec<Splice>) -> Result<String, SpliceError> {
    for splice in &splices {
        splice.validate(text)?;
    }

    // Descending by start
    splices.sort_by(|a, b| b.region.start.cmp(&a.region.start));

    for window in splices.windows(2) {
        let (later, earlier) = (&window[0], &window[1]);
        if earlier.region.overlaps(&later.region) {
            return Err(SpliceError::Overlap {
                first: earlier.region,
                second: later.region,
            });
        }
    }

    let mut out = text.to_string();
    for splice in &splices {
        if splice.is_noop(&out) {
            continue;
        }
        out.replace_range(splice.region.start..splice.region.end, &splice.new_text);
    }

    Ok(out)
}
