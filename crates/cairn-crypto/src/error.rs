use thiserror::Error;

/// Errors from canonical encoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CanonicalError {
    /// The value cannot be represented in the canonical form
    /// (non-string map keys or a failing `Serialize` impl).
    #[error("unsupported value: {0}")]
    Unsupported(String),

    #[error("payload nests deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for canonical encoding results.
pub type CanonicalResult<T> = Result<T, CanonicalError>;
