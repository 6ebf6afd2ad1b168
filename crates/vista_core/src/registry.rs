//! View registry: validation, normalization, and replace semantics

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::RegistryError;
use crate::view::{View, ViewRole};

const PAGE_FILE_NAMES: [&str; 2] = ["page.tsx", "page.jsx"];

/// Registered views keyed by canonical path, with an address index.
///
/// Source files live under the role prefix on disk
/// (`<views_root>/apps/...`, `<views_root>/pages/...`); registration paths
/// omit the prefix and the canonical path re-adds it. Re-registering a path
/// replaces the stored view (and its `ssr` flag) wholesale.
#[derive(Debug)]
pub struct ViewRegistry {
    views_root: PathBuf,
    default_ssr: bool,
    views: HashMap<PathBuf, View>,
    addresses: HashMap<String, PathBuf>,
}

impl ViewRegistry {
    pub fn new(views_root: impl Into<PathBuf>) -> Self {
        Self {
            views_root: views_root.into(),
            default_ssr: false,
            views: HashMap::new(),
            addresses: HashMap::new(),
        }
    }

    /// Default for registrations that do not pass an explicit `ssr` flag.
    pub fn with_default_ssr(mut self, ssr: bool) -> Self {
        self.default_ssr = ssr;
        self
    }

    pub fn views_root(&self) -> &Path {
        &self.views_root
    }

    /// Validate `path`, derive its identity and address, and store the view.
    ///
    /// Bare directories resolve through `page.tsx` then `page.jsx`. Passing
    /// `ssr: None` inherits the registry default. Returns the stored view.
    pub fn register(
        &mut self,
        path: &Path,
        role: ViewRole,
        ssr: Option<bool>,
    ) -> Result<View, RegistryError> {
        let source = self.normalize(path, role)?;
        let ssr = ssr.unwrap_or(self.default_ssr);

        if ssr && role == ViewRole::Page {
            return Err(RegistryError::invalid(
                path,
                "server rendering requires an app view",
            ));
        }

        let view = View::new(source, role, ssr);
        debug!(
            canonical = %view.canonical().display(),
            address = %view.address(),
            ssr,
            "registered view"
        );
        self.addresses
            .insert(view.address(), view.canonical().to_path_buf());
        self.views
            .insert(view.canonical().to_path_buf(), view.clone());
        Ok(view)
    }

    pub fn get(&self, canonical: &Path) -> Option<&View> {
        self.views.get(canonical)
    }

    /// Look a view up by its `ui://` resource address.
    pub fn by_address(&self, address: &str) -> Option<&View> {
        self.views.get(self.addresses.get(address)?)
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.addresses.keys().map(String::as_str)
    }

    /// All views, sorted by canonical path for deterministic build input.
    pub fn snapshot(&self) -> Vec<View> {
        let mut views: Vec<View> = self.views.values().cloned().collect();
        views.sort_by(|a, b| a.canonical().cmp(b.canonical()));
        views
    }

    fn normalize(&self, path: &Path, role: ViewRole) -> Result<PathBuf, RegistryError> {
        if path.is_absolute() {
            return Err(RegistryError::invalid(path, "must be a relative path"));
        }
        if path.as_os_str().is_empty() {
            return Err(RegistryError::invalid(path, "must not be empty"));
        }
        for component in path.components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(RegistryError::invalid(
                    path,
                    "must not contain traversal segments",
                ));
            }
        }

        let source = self.resolve_directory(path, role)?;

        let file_name = source.file_name().and_then(|name| name.to_str());
        if !file_name.is_some_and(|name| PAGE_FILE_NAMES.contains(&name)) {
            return Err(RegistryError::invalid(
                path,
                "must target page.tsx or page.jsx",
            ));
        }
        if source.components().count() < 2 {
            return Err(RegistryError::invalid(
                path,
                "must include at least one directory segment",
            ));
        }
        let starts_with_prefix = source
            .components()
            .next()
            .is_some_and(|component| component.as_os_str() == role.prefix());
        if starts_with_prefix {
            return Err(RegistryError::invalid(
                path,
                format!("must not start with {}/", role.prefix()),
            ));
        }

        let on_disk = self.views_root.join(role.prefix()).join(&source);
        if !on_disk.is_file() {
            return Err(RegistryError::not_found(
                Path::new(role.prefix()).join(&source),
                &self.views_root,
            ));
        }
        Ok(source)
    }

    /// A path naming a directory resolves to its conventional entry file.
    fn resolve_directory(&self, path: &Path, role: ViewRole) -> Result<PathBuf, RegistryError> {
        let base = self.views_root.join(role.prefix()).join(path);
        if !base.is_dir() {
            return Ok(path.to_path_buf());
        }
        for name in PAGE_FILE_NAMES {
            if base.join(name).is_file() {
                return Ok(path.join(name));
            }
        }
        Err(RegistryError::not_found(
            Path::new(role.prefix()).join(path).join(PAGE_FILE_NAMES[0]),
            &self.views_root,
        ))
    }
}
