//! Section Sync: marker-delimited block synchronization between text documents
//!
//! Copies a region bounded by a start and an end marker out of a source
//! document, optionally rewrites it, and splices it into the region bounded by
//! the corresponding markers in a destination document. Everything outside
//! the destination region is preserved byte for byte.
//!
//! # Architecture
//!
//! Every destination change compiles down to a single primitive: [`Splice`],
//! a verified replacement of one [`Region`]. Markers are resolved by
//! [`locate`], regions by [`extract`], rewrites by [`Transform`], and
//! [`synchronize`] ties them together for a primary section plus any number
//! of secondary sections.
//!
//! # Guarantees
//!
//! - All regions are resolved against the unmodified documents before any
//!   splice is applied
//! - A missing marker aborts the whole operation; nothing is written
//! - Atomic file writes (tempfile + fsync + rename)
//! - Configured paths stay inside the sync root
//! - Running the same operation twice leaves the destination unchanged
//!
//! # Example
//!
//! ```
//! use section_sync::{synchronize, MarkerPair, SectionSpec, SyncOperation, SyncStatus};
//!
//! let op = SyncOperation::new(SectionSpec::mirrored(
//!     "main",
//!     MarkerPair::literal("<!--S-->", "<!--E-->"),
//! ));
//!
//! let outcome = synchronize("A<!--S-->BBB<!--E-->C", "X<!--S-->OLD<!--E-->Y", &op)?;
//! assert_eq!(outcome.text, "X<!--S-->BBB<!--E-->Y");
//! assert_eq!(outcome.status, SyncStatus::Updated);
//! # Ok::<(), section_sync::SyncError>(())
//! ```

pub mod config;
pub mod document;
pub mod extract;
pub mod locate;
pub mod safety;
pub mod splice;
pub mod sync;
pub mod transform;

// Re-exports
pub use config::{
    apply_config, check_config, load_from_path, load_from_str, ConfigError, JobError, JobResult,
    SyncConfig,
};
pub use document::{content_hash, Document};
pub use extract::{extract, AddressingMode, Block, BoundaryPolicy, ExtractError, Extraction, Region};
pub use locate::{locate, locate_line, LocateError, Marker, MarkerMatch};
pub use safety::{RootGuard, SafetyError};
pub use splice::{apply_splices, splice, Splice, SpliceError, Verification};
pub use sync::{
    synchronize, synchronize_files, FileSyncOptions, MarkerPair, SectionSource, SectionSpec,
    SyncError, SyncOperation, SyncOutcome, SyncStatus,
};
pub use transform::{Rule, Transform, TransformError};
