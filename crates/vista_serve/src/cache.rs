//! Per-view render cache

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone)]
struct CachedRender {
    fingerprint: Fingerprint,
    html: String,
}

/// At most one cached render per view, keyed by canonical path.
///
/// Lookups take a shared lock only, so cached reads of one view never
/// serialize. The per-slot async gate serializes recomputation of a single
/// view without touching unrelated ones.
#[derive(Debug, Default)]
pub struct RenderCache {
    slots: DashMap<PathBuf, Arc<ViewSlot>>,
}

impl RenderCache {
    pub fn slot(&self, canonical: &Path) -> Arc<ViewSlot> {
        self.slots
            .entry(canonical.to_path_buf())
            .or_default()
            .clone()
    }
}

#[derive(Debug, Default)]
pub struct ViewSlot {
    pub(crate) gate: Mutex<()>,
    rendered: RwLock<Option<CachedRender>>,
}

impl ViewSlot {
    /// The cached render, if its fingerprint still matches.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<String> {
        let guard = self.rendered.read().expect("render cache lock poisoned");
        guard
            .as_ref()
            .filter(|cached| &cached.fingerprint == fingerprint)
            .map(|cached| cached.html.clone())
    }

    /// Replace the cached render wholesale.
    pub fn store(&self, fingerprint: Fingerprint, html: String) {
        let mut guard = self.rendered.write().expect("render cache lock poisoned");
        *guard = Some(CachedRender { fingerprint, html });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vista_core::ArtifactPaths;

    async fn fingerprint(root: &TempDir, client: &str) -> Fingerprint {
        let artifacts = ArtifactPaths {
            client: PathBuf::from(client),
            server: None,
            stylesheet: None,
        };
        Fingerprint::capture(root.path(), &artifacts).await
    }

    #[tokio::test]
    async fn lookup_misses_until_stored() {
        let root = TempDir::new().expect("temp output root");
        std::fs::write(root.path().join("client.js"), "1;").expect("write");

        let cache = RenderCache::default();
        let slot = cache.slot(Path::new("apps/clock/page.tsx"));
        let print = fingerprint(&root, "client.js").await;

        assert_eq!(slot.lookup(&print), None);
        slot.store(print.clone(), "<html/>".to_owned());
        assert_eq!(slot.lookup(&print), Some("<html/>".to_owned()));
    }

    #[tokio::test]
    async fn stale_fingerprint_misses() {
        let root = TempDir::new().expect("temp output root");
        std::fs::write(root.path().join("client.js"), "1;").expect("write");

        let cache = RenderCache::default();
        let slot = cache.slot(Path::new("apps/clock/page.tsx"));
        let print = fingerprint(&root, "client.js").await;
        slot.store(print, "<html/>".to_owned());

        std::fs::write(root.path().join("client.js"), "1; 2;").expect("write");
        let fresh = fingerprint(&root, "client.js").await;
        assert_eq!(slot.lookup(&fresh), None);
    }

    #[test]
    fn slots_are_shared_per_view() {
        let cache = RenderCache::default();
        let first = cache.slot(Path::new("apps/clock/page.tsx"));
        let second = cache.slot(Path::new("apps/clock/page.tsx"));
        let other = cache.slot(Path::new("apps/notes/page.tsx"));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }
}
