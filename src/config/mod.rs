pub mod applicator;
pub mod loader;
pub mod schema;

pub use applicator::{
    apply_config, check_config, run_jobs, JobError, JobResult, Preview, RunOptions,
};
pub use loader::{load_from_path, load_from_str, ConfigError};
pub use schema::{
    JobDefinition, MarkerDefinition, Metadata, RuleDefinition, SectionDefinition, SyncConfig,
    ValidationError, ValidationIssue,
};
