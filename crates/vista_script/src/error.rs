use thiserror::Error;

/// Errors surfaced by script evaluation.
///
/// Both variants are recoverable: each call runs in a fresh context, so a
/// failed evaluation never poisons later ones.
#[derive(Debug, Clone, Error)]
pub enum ScriptError {
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Cannot convert value: unsupported JavaScript value ({0})")]
    UnsupportedValue(String),
}
