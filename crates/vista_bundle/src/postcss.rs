//! PostCSS plugin: compile emitted stylesheets in place

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::plugin::{Plugin, PluginError, StopSignal};

static NEXT_TEMP_ID: AtomicU64 = AtomicU64::new(0);

/// Builds and watches stylesheet artifacts using postcss-cli.
///
/// The CLI is resolved from `<views_root>/node_modules/.bin`; every `.css`
/// file under the output root is compiled through a temporary file and
/// written back in place.
#[derive(Debug, Clone)]
pub struct PostCss {
    poll_interval: Duration,
}

impl PostCss {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interval between change scans in watch mode.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn resolve_cli(&self, views_root: &Path) -> Result<PathBuf, PluginError> {
        let bin_dir = views_root.join("node_modules").join(".bin");
        let mut candidates = Vec::new();
        if cfg!(windows) {
            candidates.push(bin_dir.join("postcss.cmd"));
            candidates.push(bin_dir.join("postcss.exe"));
        }
        candidates.push(bin_dir.join("postcss"));

        for candidate in candidates {
            if tokio::fs::metadata(&candidate)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false)
            {
                return Ok(candidate);
            }
        }
        Err(PluginError::ToolNotFound {
            tool: "postcss-cli".to_owned(),
            searched: bin_dir,
            hint: "npm install -D postcss postcss-cli".to_owned(),
        })
    }

    async fn process_css_file(
        &self,
        css_path: &Path,
        cli_path: &Path,
        views_root: &Path,
    ) -> Result<(), PluginError> {
        let temp_id = NEXT_TEMP_ID.fetch_add(1, Ordering::Relaxed);
        let temp_output = std::env::temp_dir().join(format!(
            "vista-postcss-{}-{temp_id}.css",
            std::process::id()
        ));

        let output = Command::new(cli_path)
            .arg(css_path)
            .arg("-o")
            .arg(&temp_output)
            .current_dir(views_root)
            .env("NODE_PATH", views_root.join("node_modules"))
            .output()
            .await?;

        if !output.status.success() {
            let detail = String::from_utf8_lossy(&output.stderr).trim().to_owned();
            let detail = if detail.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_owned()
            } else {
                detail
            };
            return Err(PluginError::ToolFailed {
                tool: "postcss".to_owned(),
                path: css_path.to_path_buf(),
                detail: if detail.is_empty() {
                    "unknown postcss error".to_owned()
                } else {
                    detail
                },
            });
        }

        let compiled = tokio::fs::read_to_string(&temp_output).await.map_err(|_| {
            PluginError::ToolFailed {
                tool: "postcss".to_owned(),
                path: css_path.to_path_buf(),
                detail: "postcss did not produce output".to_owned(),
            }
        })?;
        tokio::fs::write(css_path, compiled).await?;
        let _ = tokio::fs::remove_file(&temp_output).await;
        debug!(path = %css_path.display(), "compiled stylesheet");
        Ok(())
    }

    /// Every `.css` file under `output_root`, sorted for determinism.
    async fn collect_css_files(&self, output_root: &Path) -> Result<Vec<PathBuf>, PluginError> {
        let mut css_files = Vec::new();
        let mut pending = vec![output_root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // The output root may not exist before the first build.
                Err(_) => continue,
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "css") {
                    css_files.push(path);
                }
            }
        }

        css_files.sort();
        Ok(css_files)
    }
}

impl Default for PostCss {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl Plugin for PostCss {
    fn name(&self) -> &str {
        "postcss"
    }

    async fn build(&self, views_root: &Path, output_root: &Path) -> Result<(), PluginError> {
        let css_files = self.collect_css_files(output_root).await?;
        if css_files.is_empty() {
            return Ok(());
        }
        let cli_path = self.resolve_cli(views_root).await?;
        for css_path in css_files {
            self.process_css_file(&css_path, &cli_path, views_root)
                .await?;
        }
        Ok(())
    }

    async fn watch(
        &self,
        views_root: &Path,
        output_root: &Path,
        mut stop: StopSignal,
    ) -> Result<(), PluginError> {
        let cli_path = self.resolve_cli(views_root).await?;
        let mut known_mtimes: HashMap<PathBuf, SystemTime> = HashMap::new();

        while !stop.is_stopped() {
            for css_path in self.collect_css_files(output_root).await? {
                let current_mtime = match tokio::fs::metadata(&css_path).await {
                    Ok(meta) => meta.modified()?,
                    // Removed between scan and stat.
                    Err(_) => {
                        known_mtimes.remove(&css_path);
                        continue;
                    }
                };
                if known_mtimes.get(&css_path) == Some(&current_mtime) {
                    continue;
                }

                if let Err(err) = self
                    .process_css_file(&css_path, &cli_path, views_root)
                    .await
                {
                    warn!(path = %css_path.display(), error = %err, "postcss recompile failed");
                    known_mtimes.remove(&css_path);
                    continue;
                }

                match tokio::fs::metadata(&css_path).await {
                    Ok(meta) => {
                        known_mtimes.insert(css_path, meta.modified()?);
                    }
                    Err(_) => {
                        known_mtimes.remove(&css_path);
                    }
                }
            }

            tokio::select! {
                _ = stop.stopped() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        Ok(())
    }
}
