use std::path::PathBuf;

use thiserror::Error;
use vista_bundle::{BundleError, PluginError};
use vista_script::ScriptError;

use crate::fingerprint::ArtifactKind;

/// Errors raised by host configuration and lifecycle transitions.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("views root {} does not exist or is not a directory", .0.display())]
    ViewsRootMissing(PathBuf),

    #[error("host is already running; stop it before starting again")]
    AlreadyRunning,

    #[error("failed to start worker context: {0}")]
    Worker(#[from] std::io::Error),

    #[error("startup build failed: {0}")]
    Build(#[from] BundleError),

    #[error("startup hook of plugin {plugin} failed: {source}")]
    Plugin {
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("worker context is gone")]
    WorkerGone,
}

/// Errors raised while serving a resource read.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no view is registered at {0}")]
    NotRegistered(String),

    #[error("host is not running")]
    NotRunning,

    #[error(
        "{kind} bundle for {} was not found. Has the bundler been run?",
        .view.display()
    )]
    MissingArtifact { kind: ArtifactKind, view: PathBuf },

    #[error(transparent)]
    Execution(#[from] ScriptError),

    #[error("failed to read artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("render was interrupted by shutdown")]
    Interrupted,
}
