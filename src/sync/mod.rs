//! Document synchronization: transplant marker-bounded sections from a source
//! document into a destination document as one atomic unit of work.
//!
//! A [`SyncOperation`] names a primary section and any number of secondary
//! sections (for instance a script block tied to a markup block). Every
//! section is resolved against the unmodified source and destination text,
//! all replacements are composed in a single pass, and the destination is
//! written at most once. If any marker fails to resolve, nothing is written.

pub mod engine;
pub mod errors;
pub mod operation;

pub use engine::{
    synchronize, synchronize_files, FileSyncOptions, FileSyncOutcome, SectionReport, SyncOutcome,
    SyncStatus,
};
pub use errors::{DocumentLabel, SyncError};
pub use operation::{MarkerPair, SearchScope, SectionSource, SectionSpec, SyncOperation};
