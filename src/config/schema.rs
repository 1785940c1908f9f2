use crate::extract::{AddressingMode, BoundaryPolicy};
use crate::locate::{LocateError, Marker};
use crate::sync::{MarkerPair, SearchScope, SectionSource, SectionSpec, SyncOperation};
use crate::transform::{Rule, Transform, TransformError, DEFAULT_PATH_ATTRIBUTES};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.jobs.is_empty() {
            issues.push(ValidationIssue::EmptyJobList);
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if !job.id.trim().is_empty() && !seen.insert(job.id.as_str()) {
                issues.push(ValidationIssue::InvalidCombo {
                    job_id: Some(job.id.clone()),
                    message: "job id is used more than once".to_string(),
                });
            }
            job.collect_issues(&mut issues);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Resolve job paths under the sync root and refuse paths that escape it
    #[serde(default = "default_root_relative")]
    pub root_relative: bool,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            root_relative: default_root_relative(),
        }
    }
}

fn default_root_relative() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct JobDefinition {
    pub id: String,
    /// Document sections are copied from; absent when every section is inline
    #[serde(default)]
    pub source: Option<String>,
    pub destination: String,
    pub primary: SectionDefinition,
    #[serde(default)]
    pub secondary: Vec<SectionDefinition>,
}

impl JobDefinition {
    /// Compile the job into a runnable operation.
    pub fn to_operation(&self) -> Result<SyncOperation, ValidationError> {
        let mut issues = Vec::new();
        let operation = self.build(&mut issues);
        match operation {
            Some(operation) if issues.is_empty() => Ok(operation),
            _ => Err(ValidationError { issues }),
        }
    }

    fn collect_issues(&self, issues: &mut Vec<ValidationIssue>) {
        let _ = self.build(issues);
    }

    fn build(&self, issues: &mut Vec<ValidationIssue>) -> Option<SyncOperation> {
        let job_id = if self.id.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                job_id: None,
                field: "id".to_string(),
            });
            None
        } else {
            Some(self.id.clone())
        };

        if self.destination.trim().is_empty() {
            issues.push(ValidationIssue::MissingField {
                job_id: job_id.clone(),
                field: "destination".to_string(),
            });
        }

        let primary = self.primary.build(&job_id, "primary", issues);
        let secondary: Vec<Option<SectionSpec>> = self
            .secondary
            .iter()
            .enumerate()
            .map(|(idx, section)| section.build(&job_id, &format!("secondary-{}", idx + 1), issues))
            .collect();

        let reads_source = self
            .sections()
            .any(|section| section.content.is_none());
        let has_source = self
            .source
            .as_deref()
            .is_some_and(|source| !source.trim().is_empty());
        if reads_source && !has_source {
            issues.push(ValidationIssue::MissingField {
                job_id: job_id.clone(),
                field: "source".to_string(),
            });
        }
        if !reads_source && self.source.is_some() {
            issues.push(ValidationIssue::InvalidCombo {
                job_id: job_id.clone(),
                message: "source is set but every section uses inline content".to_string(),
            });
        }

        let mut operation = SyncOperation::new(primary?);
        for section in secondary {
            operation.secondary.push(section?);
        }
        Some(operation)
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionDefinition> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }
}

/// One marker-bounded section of a job.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SectionDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start: Option<MarkerDefinition>,
    #[serde(default)]
    pub end: Option<MarkerDefinition>,
    /// Inline replacement text, used instead of `start`/`end`
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub dest_start: Option<MarkerDefinition>,
    #[serde(default)]
    pub dest_end: Option<MarkerDefinition>,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
    #[serde(default)]
    pub addressing: AddressingMode,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

impl SectionDefinition {
    fn build(
        &self,
        job_id: &Option<String>,
        label: &str,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<SectionSpec> {
        let before = issues.len();
        let name = self.name.clone().unwrap_or_else(|| label.to_string());

        let (source_markers, inline) = match &self.content {
            Some(content) => {
                if self.start.is_some() || self.end.is_some() {
                    issues.push(ValidationIssue::InvalidCombo {
                        job_id: job_id.clone(),
                        message: format!("section '{name}' sets both content and start/end"),
                    });
                }
                if self.dest_start.is_none() {
                    issues.push(missing(job_id, label, "dest_start"));
                }
                if self.dest_end.is_none() {
                    issues.push(missing(job_id, label, "dest_end"));
                }
                ((None, None), Some(content.clone()))
            }
            None => {
                let start = required(job_id, label, "start", self.start.as_ref(), issues);
                let end = required(job_id, label, "end", self.end.as_ref(), issues);
                ((start, end), None)
            }
        };

        // Destination markers default to the source markers
        let dest_start = match &self.dest_start {
            Some(marker) => compile(job_id, label, "dest_start", marker, issues),
            None => source_markers.0.clone(),
        };
        let dest_end = match &self.dest_end {
            Some(marker) => compile(job_id, label, "dest_end", marker, issues),
            None => source_markers.1.clone(),
        };

        let mut transform = Transform::default();
        for rule in &self.rules {
            match rule.to_rule() {
                Ok(rule) => transform.push(rule),
                Err(issue) => issues.push(issue.for_job(job_id)),
            }
        }

        if issues.len() > before {
            return None;
        }

        let destination = MarkerPair::new(dest_start?, dest_end?);
        let source = match (inline, source_markers) {
            (Some(content), _) => SectionSource::Inline(content),
            (None, (Some(start), Some(end))) => SectionSource::Document(MarkerPair::new(start, end)),
            (None, _) => return None,
        };

        Some(SectionSpec {
            name,
            source,
            destination,
            policy: self.boundary,
            mode: self.addressing,
            scope: self.scope,
            transform,
        })
    }
}

fn missing(job_id: &Option<String>, label: &str, field: &str) -> ValidationIssue {
    ValidationIssue::MissingField {
        job_id: job_id.clone(),
        field: format!("{label}.{field}"),
    }
}

fn required(
    job_id: &Option<String>,
    label: &str,
    field: &str,
    marker: Option<&MarkerDefinition>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Marker> {
    match marker {
        Some(marker) => compile(job_id, label, field, marker, issues),
        None => {
            issues.push(missing(job_id, label, field));
            None
        }
    }
}

fn compile(
    job_id: &Option<String>,
    label: &str,
    field: &str,
    marker: &MarkerDefinition,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Marker> {
    if marker.is_blank() {
        issues.push(ValidationIssue::InvalidCombo {
            job_id: job_id.clone(),
            message: format!("{label}.{field} is an empty marker"),
        });
        return None;
    }
    match marker.to_marker() {
        Ok(marker) => Some(marker),
        Err(LocateError::InvalidPattern { pattern, message }) => {
            issues.push(ValidationIssue::InvalidPattern {
                job_id: job_id.clone(),
                pattern,
                message,
            });
            None
        }
    }
}

/// A marker in a job file: a bare string, or a regex table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MarkerDefinition {
    Literal(String),
    Pattern {
        pattern: String,
        #[serde(default)]
        dot_all: bool,
    },
}

impl MarkerDefinition {
    pub fn to_marker(&self) -> Result<Marker, LocateError> {
        match self {
            MarkerDefinition::Literal(text) => Ok(Marker::literal(text.clone())),
            MarkerDefinition::Pattern { pattern, dot_all } => Marker::pattern_with(pattern, *dot_all),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            MarkerDefinition::Literal(text) => text.is_empty(),
            MarkerDefinition::Pattern { pattern, .. } => pattern.is_empty(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleDefinition {
    Literal {
        from: String,
        to: String,
    },
    Regex {
        pattern: String,
        replacement: String,
    },
    PathPrefix {
        from: String,
        to: String,
        #[serde(default)]
        attributes: Option<Vec<String>>,
    },
}

impl RuleDefinition {
    fn to_rule(&self) -> Result<Rule, ValidationIssue> {
        match self {
            RuleDefinition::Literal { from, to } => {
                if from.is_empty() {
                    return Err(ValidationIssue::InvalidCombo {
                        job_id: None,
                        message: "literal rule has an empty 'from'".to_string(),
                    });
                }
                Ok(Rule::literal(from.clone(), to.clone()))
            }
            RuleDefinition::Regex {
                pattern,
                replacement,
            } => Rule::regex(pattern, replacement.clone()).map_err(ValidationIssue::from),
            RuleDefinition::PathPrefix {
                from,
                to,
                attributes,
            } => {
                if from.is_empty() {
                    return Err(ValidationIssue::MissingField {
                        job_id: None,
                        field: "rules.from".to_string(),
                    });
                }
                match attributes {
                    Some(attributes) => Rule::path_prefix_in(from.clone(), to.clone(), attributes.as_slice()),
                    None => Rule::path_prefix_in(from.clone(), to.clone(), DEFAULT_PATH_ATTRIBUTES),
                }
                .map_err(ValidationIssue::from)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyJobList,
    MissingField {
        job_id: Option<String>,
        field: String,
    },
    InvalidCombo {
        job_id: Option<String>,
        message: String,
    },
    InvalidPattern {
        job_id: Option<String>,
        pattern: String,
        message: String,
    },
}

impl ValidationIssue {
    fn for_job(self, id: &Option<String>) -> Self {
        match self {
            ValidationIssue::MissingField { job_id: None, field } => ValidationIssue::MissingField {
                job_id: id.clone(),
                field,
            },
            ValidationIssue::InvalidCombo {
                job_id: None,
                message,
            } => ValidationIssue::InvalidCombo {
                job_id: id.clone(),
                message,
            },
            ValidationIssue::InvalidPattern {
                job_id: None,
                pattern,
                message,
            } => ValidationIssue::InvalidPattern {
                job_id: id.clone(),
                pattern,
                message,
            },
            other => other,
        }
    }
}

impl From<TransformError> for ValidationIssue {
    fn from(error: TransformError) -> Self {
        match error {
            TransformError::InvalidPattern { pattern, message } => ValidationIssue::InvalidPattern {
                job_id: None,
                pattern,
                message,
            },
            TransformError::NoAttributes { from } => ValidationIssue::InvalidCombo {
                job_id: None,
                message: format!("path-prefix rule for '{from}' lists no attributes"),
            },
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::EmptyJobList => write!(f, "sync config contains no jobs"),
            ValidationIssue::MissingField { job_id, field } => match job_id {
                Some(id) => write!(f, "job '{id}' missing required field '{field}'"),
                None => write!(f, "job missing required field '{field}'"),
            },
            ValidationIssue::InvalidCombo { job_id, message } => match job_id {
                Some(id) => write!(f, "job '{id}' has invalid configuration: {message}"),
                None => write!(f, "invalid job configuration: {message}"),
            },
            ValidationIssue::InvalidPattern {
                job_id,
                pattern,
                message,
            } => match job_id {
                Some(id) => write!(f, "job '{id}' has invalid pattern '{pattern}': {message}"),
                None => write!(f, "invalid pattern '{pattern}': {message}"),
            },
        }
    }
}
