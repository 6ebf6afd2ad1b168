//! Vista Bundle Seam
//!
//! Narrow interfaces to the external build tooling:
//! - The [`Bundler`] trait and its process-spawning adapter
//! - Build manifests with a deterministic fallback layout
//! - Build/watch [`Plugin`] hooks and the PostCSS adapter

pub mod bundler;
pub mod manifest;
pub mod plugin;
pub mod postcss;

pub use bundler::{BuildOptions, BundleError, Bundler, CommandBundler};
pub use manifest::Manifest;
pub use plugin::{stop_channel, Plugin, PluginError, StopHandle, StopSignal};
pub use postcss::PostCss;
