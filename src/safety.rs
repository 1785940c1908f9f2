use std::path::{Path, PathBuf};
use thiserror::Error;

/// Confines configured document paths to an explicit sync root.
#[derive(Debug, Clone)]
pub struct RootGuard {
    /// Canonical sync root
    root: PathBuf,
    /// Canonical directories under the root that are never touched
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside sync root: {path} (root: {root})")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Failed to resolve {path}: {source}")]
    Canonicalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RootGuard {
    /// Create a guard for `root`, canonicalized so symlinked roots compare
    /// correctly.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let root = canonicalize(root.as_ref())?;

        let mut forbidden_paths = Vec::new();

        // Version control internals
        if let Ok(git_dir) = root.join(".git").canonicalize() {
            forbidden_paths.push(git_dir);
        }

        Ok(Self {
            root,
            forbidden_paths,
        })
    }

    /// Resolve `path` against the root and check it stays inside.
    ///
    /// Returns the canonical absolute path. The file must exist.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let path = path.as_ref();

        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };

        // Resolves symlinks and .. components
        let canonical = canonicalize(&absolute)?;

        self.check_canonical(&canonical)?;

        Ok(canonical)
    }

    fn check_canonical(&self, canonical: &Path) -> Result<(), SafetyError> {
        if !canonical.starts_with(&self.root) {
            return Err(SafetyError::OutsideRoot {
                path: canonical.to_path_buf(),
                root: self.root.clone(),
            });
        }

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.to_path_buf(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a guard with custom forbidden paths (for testing).
    #[cfg(test)]
    pub fn with_forbidden(
        root: impl AsRef<Path>,
        forbidden: Vec<PathBuf>,
    ) -> Result<Self, SafetyError> {
        let root = canonicalize(root.as_ref())?;
        let forbidden_paths = forbidden
            .iter()
            .map(|path| canonicalize(path))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            root,
            forbidden_paths,
        })
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf, SafetyError> {
    path.canonicalize()
        .map_err(|source| SafetyError::Canonicalize {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resolve_inside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let guard = RootGuard::new(root).unwrap();

        let file = root.join("pages/contact.html");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, b"").unwrap();

        let result = guard.resolve(&file);
        assert!(result.is_ok());
    }

    #[test]
    fn test_resolve_outside_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("site");
        fs::create_dir_all(&root).unwrap();
        let guard = RootGuard::new(&root).unwrap();

        let outside = temp_dir.path().join("outside.html");
        fs::write(&outside, b"").unwrap();

        let result = guard.resolve(&outside);
        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));

        let result = guard.resolve("../outside.html");
        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }

    #[test]
    fn test_resolve_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        let forbidden = root.join("vendor");
        fs::create_dir_all(&forbidden).unwrap();

        let guard = RootGuard::with_forbidden(root, vec![forbidden.clone()]).unwrap();

        let file = forbidden.join("lib.js");
        fs::write(&file, b"").unwrap();

        let result = guard.resolve(&file);
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_git_dir_is_forbidden() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join(".git/config"), b"").unwrap();

        let guard = RootGuard::new(root).unwrap();
        let result = guard.resolve(".git/config");
        assert!(matches!(result, Err(SafetyError::ForbiddenPath { .. })));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let guard = RootGuard::new(temp_dir.path()).unwrap();

        let err = guard.resolve("missing.html").unwrap_err();
        assert!(matches!(err, SafetyError::Canonicalize { .. }));
        assert!(err.to_string().contains("missing.html"));
    }

    #[test]
    #[cfg(unix)]
    fn test_resolve_symlink_escape() {
        use std::os::unix::fs::symlink;

        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("site");
        fs::create_dir_all(&root).unwrap();

        let outside = temp_dir.path().join("outside.html");
        fs::write(&outside, b"").unwrap();

        let link = root.join("escape.html");
        symlink(&outside, &link).unwrap();

        let guard = RootGuard::new(&root).unwrap();
        let result = guard.resolve(&link);

        assert!(matches!(result, Err(SafetyError::OutsideRoot { .. })));
    }
}
