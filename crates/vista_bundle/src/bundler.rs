//! Build invoker seam and the external-process adapter

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};
use vista_core::{posix, View};

use crate::manifest::Manifest;

/// One build request.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub dev: bool,
    pub minify: bool,
    pub views_root: PathBuf,
    pub output_root: PathBuf,
}

/// Errors raised by build invocation.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("no views to build; register at least one view first")]
    NoViews,

    #[error("failed to launch bundler {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("bundler exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Compiles view sources into servable artifacts under the output root.
///
/// Implementations must be idempotent across repeated calls. With
/// `options.dev` set a call may run indefinitely, rebuilding on change; it
/// must exit promptly when the driving task is cancelled. A single pass
/// requires `dev = false`.
#[async_trait]
pub trait Bundler: Send + Sync {
    async fn build(&self, views: &[View], options: &BuildOptions)
        -> Result<Manifest, BundleError>;
}

/// Runs an external bundler adapter as a child process.
///
/// The adapter executable receives, with its working directory set to the
/// views root:
///
/// - `--out-dir <dir>`: where artifacts must land
/// - `--dev`: watch and rebuild until terminated
/// - `--minify`: minify outputs
/// - `--server-entry <stem>=<source>`: one per server-rendered view
/// - `<stem>=<source>`: one per client entry
///
/// and is contracted to write artifacts at the `<stem>.js` / `<stem>.css`
/// locations the entry names encode. A bare executable name resolves
/// through `<views_root>/node_modules/.bin` before `PATH`.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: PathBuf,
    extra_args: Vec<String>,
}

impl CommandBundler {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    /// Prepend a fixed argument to every invocation.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    async fn resolve_program(&self, views_root: &Path) -> PathBuf {
        if self.program.is_absolute() || self.program.components().count() > 1 {
            return self.program.clone();
        }

        let bin_dir = views_root.join("node_modules").join(".bin");
        let mut candidates = Vec::new();
        if cfg!(windows) {
            for extension in ["cmd", "exe"] {
                candidates.push(bin_dir.join(&self.program).with_extension(extension));
            }
        }
        candidates.push(bin_dir.join(&self.program));

        for candidate in candidates {
            if tokio::fs::metadata(&candidate)
                .await
                .map(|meta| meta.is_file())
                .unwrap_or(false)
            {
                return candidate;
            }
        }
        // Leave bare names to PATH resolution; spawn errors surface the rest.
        self.program.clone()
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn build(
        &self,
        views: &[View],
        options: &BuildOptions,
    ) -> Result<Manifest, BundleError> {
        if views.is_empty() {
            return Err(BundleError::NoViews);
        }

        let program = self.resolve_program(&options.views_root).await;
        let args = assemble_args(views, options);
        debug!(program = %program.display(), ?args, "invoking bundler");

        let mut command = Command::new(&program);
        command
            .args(&self.extra_args)
            .args(&args)
            .current_dir(&options.views_root);

        if options.dev {
            // The watch process runs until the driving task is cancelled;
            // kill_on_drop bounds cancellation to the next yield point.
            command.kill_on_drop(true);
            let mut child = command.spawn().map_err(|source| BundleError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
            let status = child.wait().await?;
            if !status.success() {
                return Err(BundleError::Failed {
                    status,
                    stderr: String::new(),
                });
            }
            info!("bundler watch process exited");
        } else {
            let output = command.output().await.map_err(|source| BundleError::Spawn {
                program: program.display().to_string(),
                source,
            })?;
            if !output.status.success() {
                return Err(BundleError::Failed {
                    status: output.status,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                });
            }
        }

        Ok(Manifest::fallback(views))
    }
}

fn assemble_args(views: &[View], options: &BuildOptions) -> Vec<String> {
    let mut args = vec![
        "--out-dir".to_owned(),
        options.output_root.display().to_string(),
    ];
    if options.dev {
        args.push("--dev".to_owned());
    }
    if options.minify {
        args.push("--minify".to_owned());
    }
    for view in views {
        let artifacts = view.artifacts();
        let source = posix(view.canonical());
        if let Some(server) = &artifacts.server {
            args.push("--server-entry".to_owned());
            args.push(format!("{}={source}", posix(&server.with_extension(""))));
        }
        args.push(format!(
            "{}={source}",
            posix(&artifacts.client.with_extension(""))
        ));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use vista_core::{ViewRegistry, ViewRole};

    fn project() -> (TempDir, Vec<View>) {
        let root = TempDir::new().expect("temp views root");
        for relative in ["apps/clock/page.tsx", "apps/notes/page.tsx"] {
            let file = root.path().join(relative);
            fs::create_dir_all(file.parent().expect("parent")).expect("mkdir");
            fs::write(file, "export default null;\n").expect("write fixture");
        }

        let mut registry = ViewRegistry::new(root.path());
        registry
            .register(Path::new("clock"), ViewRole::App, Some(true))
            .expect("registration");
        registry
            .register(Path::new("notes"), ViewRole::App, Some(false))
            .expect("registration");
        let views = registry.snapshot();
        (root, views)
    }

    fn options(root: &TempDir, dev: bool, minify: bool) -> BuildOptions {
        BuildOptions {
            dev,
            minify,
            views_root: root.path().to_path_buf(),
            output_root: root.path().join(".vista"),
        }
    }

    #[test]
    fn args_carry_entries_and_flags() {
        let (root, views) = project();
        let args = assemble_args(&views, &options(&root, false, true));

        assert_eq!(args[0], "--out-dir");
        assert!(args.contains(&"--minify".to_owned()));
        assert!(!args.contains(&"--dev".to_owned()));
        assert!(args.contains(&"clock/client=apps/clock/page.tsx".to_owned()));
        assert!(args.contains(&"notes/client=apps/notes/page.tsx".to_owned()));
    }

    #[test]
    fn server_entries_only_for_ssr_views() {
        let (root, views) = project();
        let args = assemble_args(&views, &options(&root, true, false));

        assert!(args.contains(&"--dev".to_owned()));
        let server_flags = args
            .iter()
            .filter(|arg| *arg == "--server-entry")
            .count();
        assert_eq!(server_flags, 1);
        assert!(args.contains(&"clock/server=apps/clock/page.tsx".to_owned()));
    }

    #[tokio::test]
    async fn empty_view_set_is_rejected() {
        let root = TempDir::new().expect("temp views root");
        let bundler = CommandBundler::new("true");
        let err = bundler
            .build(&[], &options(&root, false, false))
            .await
            .expect_err("empty view set");
        assert!(matches!(err, BundleError::NoViews));
    }

    #[tokio::test]
    async fn bare_name_prefers_node_modules_bin() {
        let root = TempDir::new().expect("temp views root");
        let bin = root.path().join("node_modules/.bin");
        fs::create_dir_all(&bin).expect("mkdir");
        fs::write(bin.join("bundle-adapter"), "#!/bin/sh\n").expect("write stub");

        let bundler = CommandBundler::new("bundle-adapter");
        let resolved = bundler.resolve_program(root.path()).await;
        assert_eq!(resolved, bin.join("bundle-adapter"));

        let unresolved = CommandBundler::new("missing-adapter")
            .resolve_program(root.path())
            .await;
        assert_eq!(unresolved, PathBuf::from("missing-adapter"));
    }
}
