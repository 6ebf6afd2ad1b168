use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while registering a view.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid view path {}: {reason}", .path.display())]
    InvalidPath { path: PathBuf, reason: String },

    #[error("view {} was not found under {}", .path.display(), .root.display())]
    FileNotFound { path: PathBuf, root: PathBuf },
}

impl RegistryError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(path: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self::FileNotFound {
            path: path.into(),
            root: root.into(),
        }
    }
}
