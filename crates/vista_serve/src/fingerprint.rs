//! Artifact fingerprints: a cheap metadata proxy for output changes

use std::fmt;
use std::path::Path;
use std::time::SystemTime;

use vista_core::ArtifactPaths;

/// The artifact kinds a view can produce, in fingerprint order.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    Client,
    Server,
    Stylesheet,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ArtifactKind::Client => "client",
            ArtifactKind::Server => "server",
            ArtifactKind::Stylesheet => "stylesheet",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stamp {
    Present { modified: SystemTime, len: u64 },
    Absent,
}

/// Metadata snapshot of a view's artifacts, one entry per kind.
///
/// Compared entrywise; content is never hashed, so a same-size write within
/// one filesystem timestamp tick is indistinguishable from no change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    entries: [Stamp; 3],
}

impl Fingerprint {
    pub async fn capture(output_root: &Path, artifacts: &ArtifactPaths) -> Self {
        Self {
            entries: [
                stamp(output_root, Some(&artifacts.client)).await,
                stamp(output_root, artifacts.server.as_deref()).await,
                stamp(output_root, artifacts.stylesheet.as_deref()).await,
            ],
        }
    }
}

async fn stamp(output_root: &Path, relative: Option<&Path>) -> Stamp {
    let Some(relative) = relative else {
        return Stamp::Absent;
    };
    match tokio::fs::metadata(output_root.join(relative)).await {
        Ok(meta) => Stamp::Present {
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            len: meta.len(),
        },
        Err(_) => Stamp::Absent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn artifacts() -> ArtifactPaths {
        ArtifactPaths {
            client: PathBuf::from("clock/client.js"),
            server: Some(PathBuf::from("clock/server.js")),
            stylesheet: Some(PathBuf::from("clock/client.css")),
        }
    }

    fn write(root: &TempDir, relative: &str, contents: &str) {
        let file = root.path().join(relative);
        fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
        fs::write(file, contents).expect("write artifact");
    }

    #[tokio::test]
    async fn unchanged_outputs_compare_equal() {
        let root = TempDir::new().expect("temp output root");
        write(&root, "clock/client.js", "console.log(1);");

        let first = Fingerprint::capture(root.path(), &artifacts()).await;
        let second = Fingerprint::capture(root.path(), &artifacts()).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn size_change_invalidates() {
        let root = TempDir::new().expect("temp output root");
        write(&root, "clock/client.js", "console.log(1);");
        let before = Fingerprint::capture(root.path(), &artifacts()).await;

        write(&root, "clock/client.js", "console.log(1); console.log(2);");
        let after = Fingerprint::capture(root.path(), &artifacts()).await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn appearing_artifact_invalidates() {
        let root = TempDir::new().expect("temp output root");
        write(&root, "clock/client.js", "console.log(1);");
        let before = Fingerprint::capture(root.path(), &artifacts()).await;

        write(&root, "clock/server.js", "__vista_set_html('<div/>');");
        let after = Fingerprint::capture(root.path(), &artifacts()).await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn absent_entries_match_missing_files() {
        let root = TempDir::new().expect("temp output root");
        let without_server = ArtifactPaths {
            server: None,
            ..artifacts()
        };
        // No files on disk at all: a None path and a missing file stamp the same.
        let none = Fingerprint::capture(root.path(), &without_server).await;
        let missing = Fingerprint::capture(root.path(), &artifacts()).await;
        assert_eq!(none, missing);
    }
}
