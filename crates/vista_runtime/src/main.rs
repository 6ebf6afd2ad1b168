//! Vista Runtime
//!
//! Minimal binary that links the workspace crates: discovers views under a
//! root, builds them through the configured bundler adapter, and renders
//! every registered address.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use vista_bundle::{CommandBundler, PostCss};
use vista_core::ViewRole;
use vista_serve::{HostSettings, ViewHost};

const USAGE: &str = "usage: vista <views-root> [--dev] [--ssr] [--postcss]";

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let mut views_root: Option<PathBuf> = None;
    let mut dev = false;
    let mut ssr = false;
    let mut postcss = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--dev" => dev = true,
            "--ssr" => ssr = true,
            "--postcss" => postcss = true,
            other if !other.starts_with('-') => views_root = Some(PathBuf::from(other)),
            other => bail!("unknown flag {other}\n{USAGE}"),
        }
    }
    let views_root = views_root.context(USAGE)?;

    let adapter = std::env::var("VISTA_BUNDLER")
        .context("set VISTA_BUNDLER to the bundler adapter executable")?;
    let bundler = Arc::new(CommandBundler::new(adapter));

    let settings = HostSettings {
        ssr,
        ..HostSettings::default()
    };
    let mut host = ViewHost::new(&views_root, bundler, settings)?;
    if postcss {
        host = host.with_plugin(Arc::new(PostCss::new()));
    }

    for page in discover(&views_root, ViewRole::App.prefix())? {
        host.register(&page, ViewRole::App, None)?;
    }
    for page in discover(&views_root, ViewRole::Page.prefix())? {
        host.register(&page, ViewRole::Page, None)?;
    }
    let addresses = host.addresses();
    if addresses.is_empty() {
        bail!(
            "no views found under {}; expected apps/**/page.tsx or pages/**/page.tsx",
            views_root.display()
        );
    }
    tracing::info!(views = addresses.len(), "registered views");

    host.start(dev)?;

    if dev {
        println!("watching {} (press Enter to stop)", views_root.display());
        let mut line = String::new();
        let _ = std::io::stdin().read_line(&mut line);
    } else {
        let rendered_dir = host.output_root().join("rendered");
        for address in &addresses {
            let html = host.render(address)?;
            let relative = address.trim_start_matches("ui://");
            let file = rendered_dir.join(format!("{relative}.html"));
            if let Some(parent) = file.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&file, html)?;
            tracing::info!(%address, file = %file.display(), "rendered view");
        }
    }

    host.stop();
    Ok(())
}

/// Entry files under `<root>/<prefix>`, relative to that prefix, sorted.
fn discover(root: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let base = root.join(prefix);
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut pending = vec![base.clone()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            if path.is_dir() {
                if name != "node_modules" && name != ".vista" {
                    pending.push(path);
                }
            } else if name == "page.tsx" || name == "page.jsx" {
                found.push(path.strip_prefix(&base)?.to_path_buf());
            }
        }
    }
    found.sort();
    Ok(found)
}
