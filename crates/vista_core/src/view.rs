//! View model: roles, canonical paths, resource addresses, artifact layout

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How a view participates in the bundle.
///
/// `Page` views map to plain per-file outputs. `App` views map to a
/// per-directory `client`/`server` output pair and may opt into server
/// rendering.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRole {
    Page,
    App,
}

impl ViewRole {
    /// Prefix prepended to the source path to form the canonical path.
    pub fn prefix(&self) -> &'static str {
        match self {
            ViewRole::Page => "pages",
            ViewRole::App => "apps",
        }
    }
}

/// Relative artifact locations for one view, rooted at the output directory.
///
/// `server` is only present for server-rendered app views. `stylesheet` is a
/// location the bundler may or may not emit; existence is checked at read
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactPaths {
    pub client: PathBuf,
    pub server: Option<PathBuf>,
    pub stylesheet: Option<PathBuf>,
}

/// A registered UI source file bound to a resource address and build request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    source: PathBuf,
    canonical: PathBuf,
    role: ViewRole,
    ssr: bool,
}

impl View {
    pub(crate) fn new(source: PathBuf, role: ViewRole, ssr: bool) -> Self {
        let canonical = Path::new(role.prefix()).join(&source);
        Self {
            source,
            canonical,
            role,
            ssr,
        }
    }

    /// Normalized relative source path, e.g. `clock/page.tsx`.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Role-prefixed identity, e.g. `apps/clock/page.tsx`.
    /// Exactly one view persists per canonical path.
    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    pub fn role(&self) -> ViewRole {
        self.role
    }

    pub fn ssr(&self) -> bool {
        self.ssr
    }

    /// Resource address derived from the source path's directory component,
    /// e.g. `ui://clock`.
    pub fn address(&self) -> String {
        let dir = self.source.parent().unwrap_or_else(|| Path::new(""));
        format!("ui://{}", posix(dir))
    }

    /// Output locations for this view, derivable without a build manifest.
    ///
    /// App views collapse to `<dir>/client.js` (+ `server.js` when server
    /// rendered, `client.css` for styles). Page views keep their canonical
    /// stem: `pages/<dir>/page.js` and `pages/<dir>/page.css`.
    pub fn artifacts(&self) -> ArtifactPaths {
        match self.role {
            ViewRole::App => {
                let tool_dir = self.source.parent().unwrap_or_else(|| Path::new(""));
                ArtifactPaths {
                    client: tool_dir.join("client.js"),
                    server: self.ssr.then(|| tool_dir.join("server.js")),
                    stylesheet: Some(tool_dir.join("client.css")),
                }
            }
            ViewRole::Page => {
                let stem = self.canonical.with_extension("");
                ArtifactPaths {
                    client: stem.with_extension("js"),
                    server: None,
                    stylesheet: Some(stem.with_extension("css")),
                }
            }
        }
    }
}

/// Render a relative path with forward slashes regardless of platform.
pub fn posix(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            if !out.is_empty() {
                out.push('/');
            }
            out.push_str(&part.to_string_lossy());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(source: &str, role: ViewRole, ssr: bool) -> View {
        View::new(PathBuf::from(source), role, ssr)
    }

    #[test]
    fn canonical_prepends_role_prefix() {
        let app = view("clock/page.tsx", ViewRole::App, false);
        assert_eq!(app.canonical(), Path::new("apps/clock/page.tsx"));

        let page = view("docs/page.tsx", ViewRole::Page, false);
        assert_eq!(page.canonical(), Path::new("pages/docs/page.tsx"));
    }

    #[test]
    fn address_derives_from_directory() {
        let nested = view("nested/clock/page.tsx", ViewRole::App, false);
        assert_eq!(nested.address(), "ui://nested/clock");

        let flat = view("clock/page.tsx", ViewRole::Page, false);
        assert_eq!(flat.address(), "ui://clock");
    }

    #[test]
    fn app_artifacts_collapse_to_tool_directory() {
        let artifacts = view("clock/page.tsx", ViewRole::App, true).artifacts();
        assert_eq!(artifacts.client, Path::new("clock/client.js"));
        assert_eq!(artifacts.server.as_deref(), Some(Path::new("clock/server.js")));
        assert_eq!(
            artifacts.stylesheet.as_deref(),
            Some(Path::new("clock/client.css"))
        );
    }

    #[test]
    fn app_without_ssr_has_no_server_artifact() {
        let artifacts = view("clock/page.tsx", ViewRole::App, false).artifacts();
        assert_eq!(artifacts.server, None);
    }

    #[test]
    fn page_artifacts_keep_canonical_stem() {
        let artifacts = view("docs/intro/page.jsx", ViewRole::Page, false).artifacts();
        assert_eq!(artifacts.client, Path::new("pages/docs/intro/page.js"));
        assert_eq!(artifacts.server, None);
        assert_eq!(
            artifacts.stylesheet.as_deref(),
            Some(Path::new("pages/docs/intro/page.css"))
        );
    }
}
