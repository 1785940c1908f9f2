//! Job runner - executes the jobs of a sync config against a root directory
//!
//! Jobs run one after another in file order, so a later job sees what an
//! earlier job wrote. A failing job is reported and the remaining jobs still
//! run. Each job writes its destination at most once.

use crate::config::schema::{JobDefinition, SyncConfig, ValidationError};
use crate::safety::{RootGuard, SafetyError};
use crate::sync::{synchronize_files, FileSyncOptions, SyncError, SyncStatus};
use std::fmt;
use std::path::{Path, PathBuf};

/// Result of running a single job
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "JobResult should be checked for drift"]
pub enum JobResult {
    /// Destination differs from what the job produces
    Updated {
        file: PathBuf,
        /// False in dry-run and check mode
        written: bool,
        preview: Option<Preview>,
    },
    /// Destination already holds what the job produces
    Unchanged { file: PathBuf },
}

/// Destination text before and after a job, for diff display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub before: String,
    pub after: String,
}

impl JobResult {
    pub fn file(&self) -> &Path {
        match self {
            JobResult::Updated { file, .. } | JobResult::Unchanged { file } => file,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, JobResult::Updated { .. })
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobResult::Updated {
                file,
                written: true,
                ..
            } => write!(f, "Updated {}", file.display()),
            JobResult::Updated { file, .. } => write!(f, "Would update {}", file.display()),
            JobResult::Unchanged { file } => write!(f, "Up to date: {}", file.display()),
        }
    }
}

/// Errors while running a job
#[derive(Debug)]
pub enum JobError {
    /// Configured path could not be resolved inside the root
    Path(SafetyError),
    /// Job definition could not be compiled
    Invalid(ValidationError),
    /// Extraction, splicing or I/O failed
    Sync(SyncError),
}

impl JobError {
    /// A marker was missing or out of order in one of the documents.
    pub fn is_marker_not_found(&self) -> bool {
        matches!(self, JobError::Sync(e) if e.is_marker_not_found())
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::Path(e) => write!(f, "path error: {}", e),
            JobError::Invalid(e) => write!(f, "invalid job: {}", e),
            JobError::Sync(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JobError::Path(e) => Some(e),
            JobError::Invalid(e) => Some(e),
            JobError::Sync(e) => Some(e),
        }
    }
}

impl From<SafetyError> for JobError {
    fn from(e: SafetyError) -> Self {
        JobError::Path(e)
    }
}

impl From<ValidationError> for JobError {
    fn from(e: ValidationError) -> Self {
        JobError::Invalid(e)
    }
}

impl From<SyncError> for JobError {
    fn from(e: SyncError) -> Self {
        JobError::Sync(e)
    }
}

/// How [`run_jobs`] treats destinations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute results without writing
    pub dry_run: bool,
    /// Keep before/after text of updated destinations
    pub capture_preview: bool,
}

/// Run every job of `config`, writing updated destinations.
pub fn apply_config(
    config: &SyncConfig,
    root: &Path,
) -> Vec<(String, Result<JobResult, JobError>)> {
    run_jobs(config, root, RunOptions::default())
}

/// Evaluate every job without writing.
///
/// `Updated` here means the destination has drifted from its source.
pub fn check_config(
    config: &SyncConfig,
    root: &Path,
) -> Vec<(String, Result<JobResult, JobError>)> {
    run_jobs(
        config,
        root,
        RunOptions {
            dry_run: true,
            capture_preview: false,
        },
    )
}

/// Run jobs in file order, one result per job.
pub fn run_jobs(
    config: &SyncConfig,
    root: &Path,
    options: RunOptions,
) -> Vec<(String, Result<JobResult, JobError>)> {
    config
        .jobs
        .iter()
        .map(|job| {
            let result = run_job(config, job, root, options);
            if let Err(e) = &result {
                tracing::warn!(job = %job.id, error = %e, "job failed");
            }
            (job.id.clone(), result)
        })
        .collect()
}

fn run_job(
    config: &SyncConfig,
    job: &JobDefinition,
    root: &Path,
    options: RunOptions,
) -> Result<JobResult, JobError> {
    let operation = job.to_operation()?;
    let (source, destination) = resolve_paths(config, job, root)?;

    tracing::debug!(
        job = %job.id,
        source = ?source,
        destination = %destination.display(),
        "running job"
    );

    let outcome = synchronize_files(
        source.as_deref(),
        &destination,
        &operation,
        FileSyncOptions {
            dry_run: options.dry_run,
        },
    )?;

    Ok(match outcome.status() {
        SyncStatus::Unchanged => JobResult::Unchanged {
            file: outcome.destination,
        },
        SyncStatus::Updated => {
            let preview = options.capture_preview.then(|| Preview {
                before: outcome.before,
                after: outcome.outcome.text,
            });
            JobResult::Updated {
                file: outcome.destination,
                written: outcome.written,
                preview,
            }
        }
    })
}

fn resolve_paths(
    config: &SyncConfig,
    job: &JobDefinition,
    root: &Path,
) -> Result<(Option<PathBuf>, PathBuf), JobError> {
    if config.meta.root_relative {
        let guard = RootGuard::new(root)?;
        let source = job
            .source
            .as_deref()
            .map(|path| guard.resolve(path))
            .transpose()?;
        let destination = guard.resolve(&job.destination)?;
        Ok((source, destination))
    } else {
        Ok((
            job.source.as_deref().map(PathBuf::from),
            PathBuf::from(&job.destination),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use std::fs;

    const CONFIG: &str = r#"
[meta]
name = "site"

[[jobs]]
id = "banner"
source = "contact.html"
destination = "index.html"

[jobs.primary]
start = "<!--S-->"
end = "<!--E-->"
"#;

    fn site() -> tempfile::TempDir {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("contact.html"), "A<!--S-->BBB<!--E-->C").unwrap();
        fs::write(temp_dir.path().join("index.html"), "X<!--S-->OLD<!--E-->Y").unwrap();
        temp_dir
    }

    #[test]
    fn test_apply_then_check_is_clean() {
        let temp_dir = site();
        let config = load_from_str(CONFIG).unwrap();

        let results = apply_config(&config, temp_dir.path());
        assert_eq!(results.len(), 1);
        let result = results[0].1.as_ref().unwrap();
        assert!(matches!(result, JobResult::Updated { written: true, .. }));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("index.html")).unwrap(),
            "X<!--S-->BBB<!--E-->Y"
        );

        let results = check_config(&config, temp_dir.path());
        assert!(matches!(results[0].1, Ok(JobResult::Unchanged { .. })));
    }

    #[test]
    fn test_check_reports_drift_without_writing() {
        let temp_dir = site();
        let config = load_from_str(CONFIG).unwrap();

        let results = check_config(&config, temp_dir.path());
        let result = results[0].1.as_ref().unwrap();
        assert!(matches!(
            result,
            JobResult::Updated {
                written: false,
                preview: None,
                ..
            }
        ));
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("index.html")).unwrap(),
            "X<!--S-->OLD<!--E-->Y"
        );
    }

    #[test]
    fn test_preview_captured_on_dry_run() {
        let temp_dir = site();
        let config = load_from_str(CONFIG).unwrap();

        let results = run_jobs(
            &config,
            temp_dir.path(),
            RunOptions {
                dry_run: true,
                capture_preview: true,
            },
        );
        match results[0].1.as_ref().unwrap() {
            JobResult::Updated {
                preview: Some(preview),
                ..
            } => {
                assert_eq!(preview.before, "X<!--S-->OLD<!--E-->Y");
                assert_eq!(preview.after, "X<!--S-->BBB<!--E-->Y");
            }
            other => panic!("unexpected result: {other}"),
        }
    }

    #[test]
    fn test_destination_outside_root_rejected() {
        let temp_dir = site();
        let root = temp_dir.path().join("site");
        fs::create_dir_all(&root).unwrap();
        fs::rename(temp_dir.path().join("contact.html"), root.join("contact.html")).unwrap();

        let config = load_from_str(&CONFIG.replace("\"index.html\"", "\"../index.html\"")).unwrap();
        let results = apply_config(&config, &root);
        assert!(matches!(
            results[0].1,
            Err(JobError::Path(SafetyError::OutsideRoot { .. }))
        ));
    }

    #[test]
    fn test_failed_job_does_not_stop_later_jobs() {
        let temp_dir = site();
        let input = format!(
            "{CONFIG}\n[[jobs]]\nid = \"later\"\nsource = \"contact.html\"\ndestination = \"index.html\"\n\n[jobs.primary]\nstart = \"<!--S-->\"\nend = \"<!--E-->\"\n"
        );
        let broken = input.replacen("end = \"<!--E-->\"", "end = \"<!--MISSING-->\"", 1);
        let config = load_from_str(&broken).unwrap();

        let results = apply_config(&config, temp_dir.path());
        assert_eq!(results.len(), 2);
        assert!(results[0].1.as_ref().unwrap_err().is_marker_not_found());
        assert!(results[1].1.as_ref().unwrap().is_updated());
    }
}
