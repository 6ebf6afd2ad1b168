//! Build/watch plugin hooks

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// Errors raised by plugin hooks.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(
        "{tool} was not found in {}; install it with `{hint}` in your views directory",
        .searched.display()
    )]
    ToolNotFound {
        tool: String,
        searched: PathBuf,
        hint: String,
    },

    #[error("{tool} failed for {}: {detail}", .path.display())]
    ToolFailed {
        tool: String,
        path: PathBuf,
        detail: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A post-build processing hook pair.
///
/// `build` runs once after a completed production build. `watch` runs for
/// the lifetime of a development instance and must return promptly once
/// `stop` fires. Concrete implementations are selected when the host is
/// configured.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn build(&self, views_root: &Path, output_root: &Path) -> Result<(), PluginError>;

    async fn watch(
        &self,
        views_root: &Path,
        output_root: &Path,
        stop: StopSignal,
    ) -> Result<(), PluginError>;
}

/// Create a linked stop handle/signal pair.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owner side of the stop condition.
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cloneable stop condition handed to every watch task.
///
/// Dropping the owning [`StopHandle`] counts as stopped.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once stop is signalled (or the handle is gone).
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}
