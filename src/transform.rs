//! Ordered text rewrites applied to an extracted block.
//!
//! A rule that no longer matches is a no-op, never an error: running the same
//! transform over a block that was already rewritten leaves it unchanged as
//! long as no rule reintroduces its own trigger text.

use crate::extract::Block;
use regex::{Captures, Regex};
use std::borrow::Cow;
use thiserror::Error;

/// Attributes a path-prefix rule rewrites when none are configured.
pub const DEFAULT_PATH_ATTRIBUTES: &[&str] = &["src", "href"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("invalid rewrite pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("path-prefix rule for '{from}' lists no attributes")]
    NoAttributes { from: String },
}

/// A single deterministic rewrite.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Replace every non-overlapping occurrence, left to right
    Literal { from: String, to: String },
    /// Regex replacement; `$1` / `${name}` refer to capture groups
    Regex { pattern: Regex, replacement: String },
    /// Rewrite a path prefix, only inside quoted attribute values
    PathPrefix {
        from: String,
        to: String,
        pattern: Regex,
    },
}

impl Rule {
    pub fn literal(from: impl Into<String>, to: impl Into<String>) -> Self {
        Rule::Literal {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn regex(pattern: &str, replacement: impl Into<String>) -> Result<Self, TransformError> {
        let compiled = Regex::new(pattern).map_err(|e| TransformError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Rule::Regex {
            pattern: compiled,
            replacement: replacement.into(),
        })
    }

    /// Path rewrite scoped to `src="..."` and `href="..."` values.
    pub fn path_prefix(from: impl Into<String>, to: impl Into<String>) -> Result<Self, TransformError> {
        Self::path_prefix_in(from, to, DEFAULT_PATH_ATTRIBUTES)
    }

    /// Path rewrite scoped to the given attribute names.
    ///
    /// Only a value that *starts* with `from` right after its opening quote is
    /// rewritten; the same text elsewhere in the block is left alone.
    pub fn path_prefix_in<S: AsRef<str>>(
        from: impl Into<String>,
        to: impl Into<String>,
        attributes: &[S],
    ) -> Result<Self, TransformError> {
        let from = from.into();
        if attributes.is_empty() {
            return Err(TransformError::NoAttributes { from });
        }
        let names = attributes
            .iter()
            .map(|name| regex::escape(name.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        let source = format!(
            r#"(?P<lead>(?:^|[^\w-])(?i:{names})\s*=\s*)(?P<quote>["']){}"#,
            regex::escape(&from)
        );
        let pattern = Regex::new(&source).map_err(|e| TransformError::InvalidPattern {
            pattern: source.clone(),
            message: e.to_string(),
        })?;
        Ok(Rule::PathPrefix {
            from,
            to: to.into(),
            pattern,
        })
    }

    /// Apply the rule, returning the rewritten text and the number of
    /// replacements made.
    pub fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        match self {
            Rule::Literal { from, to } => {
                if from.is_empty() {
                    return (Cow::Borrowed(text), 0);
                }
                let count = text.matches(from.as_str()).count();
                if count == 0 {
                    (Cow::Borrowed(text), 0)
                } else {
                    (Cow::Owned(text.replace(from.as_str(), to)), count)
                }
            }
            Rule::Regex {
                pattern,
                replacement,
            } => {
                let count = pattern.find_iter(text).count();
                if count == 0 {
                    (Cow::Borrowed(text), 0)
                } else {
                    (pattern.replace_all(text, replacement.as_str()), count)
                }
            }
            Rule::PathPrefix { to, pattern, .. } => {
                let count = pattern.find_iter(text).count();
                if count == 0 {
                    return (Cow::Borrowed(text), 0);
                }
                // Closure keeps `$` in the target prefix literal
                let rewritten = pattern.replace_all(text, |caps: &Captures<'_>| {
                    format!("{}{}{}", &caps["lead"], &caps["quote"], to)
                });
                (rewritten, count)
            }
        }
    }

    /// Short human-readable description for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Rule::Literal { from, to } => format!("literal {from:?} -> {to:?}"),
            Rule::Regex {
                pattern,
                replacement,
            } => format!("regex /{}/ -> {replacement:?}", pattern.as_str()),
            Rule::PathPrefix { from, to, .. } => format!("path-prefix {from:?} -> {to:?}"),
        }
    }
}

/// Replacement counts per rule, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformStats {
    pub replacements: Vec<usize>,
}

impl TransformStats {
    pub fn total(&self) -> usize {
        self.replacements.iter().sum()
    }
}

/// An ordered rule list, applied left to right.
#[derive(Debug, Clone, Default)]
pub struct Transform {
    rules: Vec<Rule>,
}

impl Transform {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Builder-style append.
    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn apply(&self, text: &str) -> String {
        self.apply_with_stats(text).0
    }

    pub fn apply_block(&self, block: &Block) -> Block {
        Block::from(self.apply(block.as_str()))
    }

    pub fn apply_with_stats(&self, text: &str) -> (String, TransformStats) {
        let mut current = text.to_string();
        let mut stats = TransformStats::default();

        for rule in &self.rules {
            let (rewritten, count) = rule.apply(&current);
            tracing::debug!(rule = %rule.describe(), replacements = count, "applied rule");
            if let Cow::Owned(next) = rewritten {
                current = next;
            }
            stats.replacements.push(count);
        }

        (current, stats)
    }
}

impl FromIterator<Rule> for Transform {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
