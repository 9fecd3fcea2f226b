use cairn_refs::RefError;
use cairn_store::StoreError;
use thiserror::Error;

/// Errors from garbage collection.
#[derive(Debug, Error)]
pub enum GcError {
    /// The pre-flight safety check failed; nothing was deleted.
    #[error("garbage collection refused: {} unsafe root(s)", issues.len())]
    Unsafe { issues: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ref(#[from] RefError),
}

/// Result alias for garbage collection.
pub type GcResult<T> = Result<T, GcError>;
