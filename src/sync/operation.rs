use crate::extract::{AddressingMode, BoundaryPolicy};
use crate::locate::Marker;
use crate::transform::{Rule, Transform};
use serde::{Deserialize, Serialize};

/// Start and end markers delimiting one region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerPair {
    pub start: Marker,
    pub end: Marker,
}

impl MarkerPair {
    pub fn new(start: Marker, end: Marker) -> Self {
        Self { start, end }
    }

    pub fn literal(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Marker::literal(start),
            end: Marker::literal(end),
        }
    }
}

/// Where a section's replacement text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionSource {
    /// Extracted from the source document between these markers
    Document(MarkerPair),
    /// Fixed replacement text
    Inline(String),
}

/// Where marker searches begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchScope {
    /// From the top of the document
    #[default]
    Document,
    /// From the start of the primary region (within or after it)
    AfterPrimary,
}

/// One source-to-destination section binding.
#[derive(Debug, Clone)]
pub struct SectionSpec {
    pub name: String,
    pub source: SectionSource,
    pub destination: MarkerPair,
    pub policy: BoundaryPolicy,
    pub mode: AddressingMode,
    pub scope: SearchScope,
    pub transform: Transform,
}

impl SectionSpec {
    /// Section copied from the source document, located in both documents by
    /// the same markers.
    pub fn mirrored(name: impl Into<String>, markers: MarkerPair) -> Self {
        Self {
            name: name.into(),
            source: SectionSource::Document(markers.clone()),
            destination: markers,
            policy: BoundaryPolicy::default(),
            mode: AddressingMode::default(),
            scope: SearchScope::default(),
            transform: Transform::default(),
        }
    }

    /// Section copied from the source document, located in the destination by
    /// different markers.
    pub fn transplant(name: impl Into<String>, source: MarkerPair, destination: MarkerPair) -> Self {
        Self {
            source: SectionSource::Document(source),
            ..Self::mirrored(name, destination)
        }
    }

    /// Destination region replaced by fixed text.
    pub fn inline(name: impl Into<String>, content: impl Into<String>, destination: MarkerPair) -> Self {
        Self {
            source: SectionSource::Inline(content.into()),
            ..Self::mirrored(name, destination)
        }
    }

    pub fn with_policy(mut self, policy: BoundaryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_mode(mut self, mode: AddressingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.transform.push(rule);
        self
    }

    pub fn reads_source(&self) -> bool {
        matches!(self.source, SectionSource::Document(_))
    }
}

/// A primary section plus secondary sections, applied together.
#[derive(Debug, Clone)]
pub struct SyncOperation {
    pub primary: SectionSpec,
    pub secondary: Vec<SectionSpec>,
}

impl SyncOperation {
    pub fn new(primary: SectionSpec) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, section: SectionSpec) -> Self {
        self.secondary.push(section);
        self
    }

    /// Primary first, then secondaries in declaration order.
    pub fn sections(&self) -> impl Iterator<Item = &SectionSpec> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    /// Whether any section needs the source document.
    pub fn needs_source(&self) -> bool {
        self.sections().any(SectionSpec::reads_source)
    }
}
