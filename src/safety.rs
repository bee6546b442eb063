use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boundary checks for files being wired into a project manifest.
///
/// Added files must live inside the project root, because the manifest
/// records them by project-relative path. Build products, version-control
/// internals, and the project bundle itself are never valid additions.
#[derive(Debug, Clone)]
pub struct ProjectGuard {
    /// Absolute path to the project root (the directory holding the bundle)
    project_root: PathBuf,
    /// Canonical paths to forbidden directories
    forbidden_paths: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("Path is outside project: {path} (project: {project})")]
    OutsideProject { path: PathBuf, project: PathBuf },

    #[error("Path is in forbidden directory: {path} (forbidden: {forbidden})")]
    ForbiddenPath { path: PathBuf, forbidden: PathBuf },

    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("Failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl ProjectGuard {
    /// Build a guard from a manifest path.
    ///
    /// The project root is the directory containing the bundle the manifest
    /// lives in; for a bare manifest file, the directory containing it.
    pub fn for_manifest(manifest: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let manifest = manifest.as_ref().canonicalize()?;
        let bundle = manifest.parent().unwrap_or(Path::new("."));
        let is_bundle = bundle
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("xcodeproj"));
        let project_root = if is_bundle {
            bundle.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            bundle.to_path_buf()
        };

        let mut forbidden_paths = Vec::new();
        if is_bundle {
            forbidden_paths.push(bundle.to_path_buf());
        }
        for name in ["build", "DerivedData", ".git"] {
            if let Ok(dir) = project_root.join(name).canonicalize() {
                forbidden_paths.push(dir);
            }
        }

        Ok(Self {
            project_root,
            forbidden_paths,
        })
    }

    /// Check that a file may be recorded in the manifest.
    ///
    /// Relative paths resolve against the project root; symlinks and `..`
    /// components are resolved before the boundary check, so a link pointing
    /// out of the tree is rejected. On success, returns the project-relative
    /// path in manifest form (forward-slash separated).
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<String, SafetyError> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root.join(path)
        };

        let canonical = absolute.canonicalize()?;

        let relative = canonical.strip_prefix(&self.project_root).map_err(|_| {
            SafetyError::OutsideProject {
                path: canonical.clone(),
                project: self.project_root.clone(),
            }
        })?;

        for forbidden in &self.forbidden_paths {
            if canonical.starts_with(forbidden) {
                return Err(SafetyError::ForbiddenPath {
                    path: canonical.clone(),
                    forbidden: forbidden.clone(),
                });
            }
        }

        let mut parts = Vec::new();
        for component in relative.components() {
            match component.as_os_str().to_str() {
                Some(s) => parts.push(s),
                None => return Err(SafetyError::NonUtf8Path(canonical.clone())),
            }
        }
        Ok(parts.join("/"))
    }

    /// Get the project root.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }
}
