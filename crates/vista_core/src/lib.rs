//! Vista Core
//!
//! Contains the fundamental view model:
//! - View roles, canonical paths, and resource addresses
//! - Role-dependent artifact layout
//! - The view registry with validation and replace semantics

pub mod error;
pub mod registry;
pub mod view;

pub use error::RegistryError;
pub use registry::ViewRegistry;
pub use view::{posix, ArtifactPaths, View, ViewRole};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
