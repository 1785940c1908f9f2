use crate::extract::ExtractError;
use crate::splice::SpliceError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which side of a sync a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentLabel {
    Source,
    Destination,
}

impl fmt::Display for DocumentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentLabel::Source => write!(f, "source"),
            DocumentLabel::Destination => write!(f, "destination"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("section '{section}' in {document} document: {source}")]
    Marker {
        section: String,
        document: DocumentLabel,
        #[source]
        source: ExtractError,
    },

    #[error("sections '{first}' and '{second}' resolve to overlapping destination regions")]
    OverlappingRegions { first: String, second: String },

    #[error("operation copies from a source document but no source was given")]
    MissingSource,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("splice failed: {0}")]
    Splice(#[from] SpliceError),
}

impl SyncError {
    /// A required marker could not be resolved in one of the documents.
    pub fn is_marker_not_found(&self) -> bool {
        matches!(self, SyncError::Marker { source, .. } if source.is_marker_not_found())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}
