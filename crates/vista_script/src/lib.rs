//! Vista Scripting System
//!
//! Sandboxed JavaScript evaluation via QuickJS with strict result typing
//!
//! ## Architecture
//!
//! - **Isolation:** every evaluation gets a fresh runtime and context;
//!   nothing persists between calls
//! - **Marshalling:** results convert to [`ScriptValue`] or fail loudly;
//!   no silent coercion of unsupported JavaScript values
//! - **Capture:** server-rendering bundles hand markup back through the
//!   `__vista_set_html` global, which takes precedence over the
//!   completion value

pub mod bridge;
pub mod error;
pub mod value;

pub use bridge::{ScriptBridge, CAPTURE_BINDING};
pub use error::ScriptError;
pub use value::ScriptValue;

pub use rquickjs;
