//! Build manifests: view identity to artifact locations

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vista_core::{ArtifactPaths, View};

/// Maps canonical view paths to artifact locations under the output root.
///
/// `fallback` derives the same mapping the layout rule produces, covering
/// the window before the first successful build (and any view the last
/// build did not know about).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    entries: HashMap<PathBuf, ArtifactPaths>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deterministic manifest derived purely from the views' layout rule.
    pub fn fallback(views: &[View]) -> Self {
        let entries = views
            .iter()
            .map(|view| (view.canonical().to_path_buf(), view.artifacts()))
            .collect();
        Self { entries }
    }

    pub fn insert(&mut self, canonical: PathBuf, artifacts: ArtifactPaths) {
        self.entries.insert(canonical, artifacts);
    }

    pub fn get(&self, canonical: &Path) -> Option<&ArtifactPaths> {
        self.entries.get(canonical)
    }

    /// Artifact locations for `view`, falling back to the layout rule when
    /// the manifest has no entry for it.
    pub fn artifacts_for(&self, view: &View) -> ArtifactPaths {
        self.get(view.canonical())
            .cloned()
            .unwrap_or_else(|| view.artifacts())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
