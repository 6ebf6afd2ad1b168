//! Host settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serving and caching behavior of a [`crate::ViewHost`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Default server-rendering flag for registrations that omit one.
    pub ssr: bool,
    /// Serve renders from the fingerprint cache.
    pub cache: bool,
    /// Override the mode-derived minify default (production on, dev off).
    pub minify: Option<bool>,
    /// Interval between artifact polls for development reads, in milliseconds.
    pub artifact_poll_ms: u64,
    /// How long a development read waits for the first build, in milliseconds.
    pub artifact_wait_ms: u64,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            ssr: false,
            cache: true,
            minify: None,
            artifact_poll_ms: 50,
            artifact_wait_ms: 10_000,
        }
    }
}

impl HostSettings {
    pub(crate) fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.artifact_poll_ms)
    }

    pub(crate) fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.artifact_wait_ms)
    }

    pub(crate) fn effective_minify(&self, dev: bool) -> bool {
        self.minify.unwrap_or(!dev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minify_follows_mode_unless_overridden() {
        let defaults = HostSettings::default();
        assert!(defaults.effective_minify(false));
        assert!(!defaults.effective_minify(true));

        let forced = HostSettings {
            minify: Some(true),
            ..HostSettings::default()
        };
        assert!(forced.effective_minify(true));
    }

    #[test]
    fn deserializes_with_defaults() {
        let settings: HostSettings = serde_json::from_str(r#"{"ssr": true}"#).expect("parse");
        assert!(settings.ssr);
        assert!(settings.cache);
        assert_eq!(settings.artifact_poll_ms, 50);
    }
}
