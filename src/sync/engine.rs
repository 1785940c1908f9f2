use crate::document::{
    content_hash, line_separator, normalize_line_endings, write_atomic, Document,
};
use crate::extract::{extract_after, AddressingMode, Region};
use crate::splice::{apply_splices, Splice};
use crate::sync::errors::{DocumentLabel, SyncError};
use crate::sync::operation::{SearchScope, SectionSource, SectionSpec, SyncOperation};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Whether the destination text changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Updated,
    Unchanged,
}

/// How one section resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionReport {
    pub name: String,
    /// Region read from the source document (`None` for inline content)
    pub source_region: Option<Region>,
    /// Region replaced in the destination document
    pub destination_region: Region,
    /// Rewrites made by the section's transform
    pub replacements: usize,
    pub changed: bool,
}

/// Result of a pure, in-memory synchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "SyncOutcome carries the new destination text"]
pub struct SyncOutcome {
    pub text: String,
    pub status: SyncStatus,
    pub sections: Vec<SectionReport>,
}

/// Options for [`synchronize_files`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSyncOptions {
    /// Compute and report, but never write
    pub dry_run: bool,
}

/// Result of a file-backed synchronization.
#[derive(Debug, Clone)]
pub struct FileSyncOutcome {
    pub destination: PathBuf,
    /// Destination content before the operation
    pub before: String,
    pub outcome: SyncOutcome,
    /// Whether the destination file was rewritten
    pub written: bool,
}

impl FileSyncOutcome {
    pub fn status(&self) -> SyncStatus {
        self.outcome.status
    }

    pub fn hash_before(&self) -> u64 {
        content_hash(&self.before)
    }

    pub fn hash_after(&self) -> u64 {
        content_hash(&self.outcome.text)
    }
}

/// Offsets that `SearchScope::AfterPrimary` sections start searching from.
struct Anchors {
    source: usize,
    destination: usize,
}

struct ResolvedSection {
    report: SectionReport,
    splice: Splice,
}

/// Apply `operation` to in-memory documents.
///
/// Every region is resolved against the unmodified `source` and `destination`
/// text before anything is spliced. Any failure leaves no partial result.
pub fn synchronize(
    source: &str,
    destination: &str,
    operation: &SyncOperation,
) -> Result<SyncOutcome, SyncError> {
    let primary = resolve_section(source, destination, &operation.primary, None)?;
    let anchors = Anchors {
        source: primary.report.source_region.map_or(0, |r| r.start),
        destination: primary.report.destination_region.start,
    };

    let mut resolved = Vec::with_capacity(1 + operation.secondary.len());
    resolved.push(primary);
    for section in &operation.secondary {
        resolved.push(resolve_section(source, destination, section, Some(&anchors))?);
    }

    check_overlaps(&resolved)?;

    let (sections, splices): (Vec<_>, Vec<_>) = resolved
        .into_iter()
        .map(|section| (section.report, section.splice))
        .unzip();

    let text = apply_splices(destination, splices)?;
    let status = if text == destination {
        SyncStatus::Unchanged
    } else {
        SyncStatus::Updated
    };

    tracing::debug!(sections = sections.len(), ?status, "composed destination");

    Ok(SyncOutcome {
        text,
        status,
        sections,
    })
}

/// Apply `operation` to files, writing the destination at most once.
///
/// `source` may be `None` when every section is inline, and may equal
/// `destination` to move a section within one document. Markers are resolved
/// against freshly read text on every call.
pub fn synchronize_files(
    source: Option<&Path>,
    destination: &Path,
    operation: &SyncOperation,
    options: FileSyncOptions,
) -> Result<FileSyncOutcome, SyncError> {
    let before = Document::read(destination)
        .map_err(|e| SyncError::io(destination, e))?
        .into_text();

    let source_text = match (operation.needs_source(), source) {
        (false, _) => String::new(),
        (true, None) => return Err(SyncError::MissingSource),
        (true, Some(path)) if path == destination => before.clone(),
        (true, Some(path)) => Document::read(path)
            .map_err(|e| SyncError::io(path, e))?
            .into_text(),
    };

    let outcome = synchronize(&source_text, &before, operation)?;

    let written = outcome.status == SyncStatus::Updated && !options.dry_run;
    if written {
        write_atomic(destination, &outcome.text).map_err(|e| SyncError::io(destination, e))?;
        tracing::info!(path = %destination.display(), "wrote destination");
    } else if options.dry_run && outcome.status == SyncStatus::Updated {
        tracing::info!(path = %destination.display(), "dry run, destination left untouched");
    }

    Ok(FileSyncOutcome {
        destination: destination.to_path_buf(),
        before,
        outcome,
        written,
    })
}

fn resolve_section(
    source: &str,
    destination: &str,
    section: &SectionSpec,
    anchors: Option<&Anchors>,
) -> Result<ResolvedSection, SyncError> {
    let (source_after, destination_after) = match (section.scope, anchors) {
        (SearchScope::AfterPrimary, Some(anchors)) => (anchors.source, anchors.destination),
        _ => (0, 0),
    };

    let (raw_block, source_region) = match &section.source {
        SectionSource::Document(markers) => {
            let extraction = extract_after(
                source,
                &markers.start,
                &markers.end,
                section.policy,
                section.mode,
                source_after,
            )
            .map_err(|err| SyncError::Marker {
                section: section.name.clone(),
                document: DocumentLabel::Source,
                source: err,
            })?;
            (extraction.block, Some(extraction.region))
        }
        SectionSource::Inline(content) => (content.as_str(), None),
    };

    let (mut new_block, stats) = section.transform.apply_with_stats(raw_block);

    let target = extract_after(
        destination,
        &section.destination.start,
        &section.destination.end,
        section.policy,
        section.mode,
        destination_after,
    )
    .map_err(|err| SyncError::Marker {
        section: section.name.clone(),
        document: DocumentLabel::Destination,
        source: err,
    })?;

    // Whole lines in, whole lines out, terminated the way the destination is
    if section.mode == AddressingMode::Line {
        let separator = line_separator(destination);
        new_block = normalize_line_endings(&new_block, separator);
        if !new_block.is_empty() && !new_block.ends_with('\n') && !target.suffix.is_empty() {
            new_block.push_str(separator);
        }
    }

    let changed = target.block != new_block;
    tracing::debug!(
        section = %section.name,
        source = ?source_region,
        destination = %target.region,
        replacements = stats.total(),
        changed,
        "resolved section"
    );

    Ok(ResolvedSection {
        report: SectionReport {
            name: section.name.clone(),
            source_region,
            destination_region: target.region,
            replacements: stats.total(),
            changed,
        },
        splice: Splice::new(target.region, new_block, target.block),
    })
}

fn check_overlaps(resolved: &[ResolvedSection]) -> Result<(), SyncError> {
    for (idx, first) in resolved.iter().enumerate() {
        for second in &resolved[idx + 1..] {
            if first
                .report
                .destination_region
                .overlaps(&second.report.destination_region)
            {
                return Err(SyncError::OverlappingRegions {
                    first: first.report.name.clone(),
                    second: second.report.name.clone(),
                });
            }
        }
    }
    Ok(())
}
