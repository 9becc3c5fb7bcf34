//! Error types for parameter handling.

use thiserror::Error;

/// Errors from parameter mutations.
#[derive(Debug, Clone, Error)]
pub enum ParamError {
    /// A key outside the recognized parameter set was rejected (strict mode).
    #[error("unknown parameter: {0}")]
    UnknownKey(String),
}

/// Convenience alias for results using [`ParamError`].
pub type Result<T> = std::result::Result<T, ParamError>;
