//! Vista Serve
//!
//! The serving layer around the build seam:
//! - Lifecycle orchestration across production and development modes
//! - An owned worker execution context with clean start/stop
//! - The fingerprinted render cache and per-view resource handlers

pub mod cache;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod host;
pub mod settings;
mod worker;

pub use error::{RenderError, ServeError};
pub use fingerprint::{ArtifactKind, Fingerprint};
pub use host::{LifecycleState, ResourceHandler, ViewHost};
pub use settings::HostSettings;
